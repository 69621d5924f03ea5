//! Synthetic Mach-O images for unit tests.

use goblin::mach::header::{MH_DYLIB, MH_MAGIC_64};
use goblin::mach::load_command::{LC_DYLD_INFO_ONLY, LC_SEGMENT_64, LC_SYMTAB};

pub struct ImageBuilder {
    big_endian: bool,
    commands: Vec<(u32, Vec<u8>)>,
    data: Vec<(usize, Vec<u8>)>,
    pub ncmds_override: Option<u32>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            big_endian: false,
            commands: Vec::new(),
            data: Vec::new(),
            ncmds_override: None,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn u16(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    pub fn u32(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    pub fn u64(&self, v: u64) -> [u8; 8] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    /// Appends a command; `cmdsize` is 8 plus the payload length.
    pub fn command(mut self, cmd: u32, payload: &[u8]) -> Self {
        self.commands.push((cmd, payload.to_vec()));
        self
    }

    pub fn symtab(self, symoff: u32, nsyms: u32, stroff: u32, strsize: u32) -> Self {
        let payload = [
            self.u32(symoff),
            self.u32(nsyms),
            self.u32(stroff),
            self.u32(strsize),
        ]
        .concat();
        self.command(LC_SYMTAB, &payload)
    }

    pub fn segment(self, segname: &str, sections: &[(&str, u64, u64)]) -> Self {
        self.segment_at(segname, 0, 0, sections)
    }

    pub fn segment_at(
        self,
        segname: &str,
        vmaddr: u64,
        vmsize: u64,
        sections: &[(&str, u64, u64)],
    ) -> Self {
        self.segment_full(segname, vmaddr, vmsize, 0, 0, sections)
    }

    pub fn segment_full(
        self,
        segname: &str,
        vmaddr: u64,
        vmsize: u64,
        fileoff: u64,
        filesize: u64,
        sections: &[(&str, u64, u64)],
    ) -> Self {
        let mut payload = name16(segname).to_vec();
        payload.extend_from_slice(&self.u64(vmaddr));
        payload.extend_from_slice(&self.u64(vmsize));
        payload.extend_from_slice(&self.u64(fileoff));
        payload.extend_from_slice(&self.u64(filesize));
        payload.extend_from_slice(&self.u32(7));
        payload.extend_from_slice(&self.u32(5));
        payload.extend_from_slice(&self.u32(sections.len() as u32));
        payload.extend_from_slice(&self.u32(0));
        for (sectname, addr, size) in sections {
            payload.extend_from_slice(&name16(sectname));
            payload.extend_from_slice(&name16(segname));
            payload.extend_from_slice(&self.u64(*addr));
            payload.extend_from_slice(&self.u64(*size));
            payload.extend_from_slice(&[0u8; 32]);
        }
        self.command(LC_SEGMENT_64, &payload)
    }

    pub fn dyld_info_only(self, values: [u32; 10]) -> Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| self.u32(*v)).collect();
        self.command(LC_DYLD_INFO_ONLY, &payload)
    }

    pub fn linkedit(self, cmd: u32, dataoff: u32, datasize: u32) -> Self {
        let payload = [self.u32(dataoff), self.u32(datasize)].concat();
        self.command(cmd, &payload)
    }

    /// Encodes one `nlist_64` entry.
    pub fn nlist(&self, strx: u32, value: u64, desc: u16) -> Vec<u8> {
        let mut entry = self.u32(strx).to_vec();
        entry.push(0x0f);
        entry.push(1);
        entry.extend_from_slice(&self.u16(desc));
        entry.extend_from_slice(&self.u64(value));
        entry
    }

    /// Places `bytes` at an absolute offset in the built image.
    pub fn data_at(mut self, offset: usize, bytes: Vec<u8>) -> Self {
        self.data.push((offset, bytes));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let sizeofcmds: usize = self.commands.iter().map(|(_, p)| p.len() + 8).sum();
        let ncmds = self
            .ncmds_override
            .unwrap_or(self.commands.len() as u32);

        let mut image = Vec::new();
        image.extend_from_slice(&self.u32(MH_MAGIC_64));
        image.extend_from_slice(&self.u32(0x0100_000c));
        image.extend_from_slice(&self.u32(0));
        image.extend_from_slice(&self.u32(MH_DYLIB));
        image.extend_from_slice(&self.u32(ncmds));
        image.extend_from_slice(&self.u32(sizeofcmds as u32));
        image.extend_from_slice(&self.u32(0x0010_0085));
        image.extend_from_slice(&self.u32(0));

        for (cmd, payload) in &self.commands {
            image.extend_from_slice(&self.u32(*cmd));
            image.extend_from_slice(&self.u32(payload.len() as u32 + 8));
            image.extend_from_slice(payload);
        }

        for (offset, bytes) in &self.data {
            let end = offset + bytes.len();
            if image.len() < end {
                image.resize(end, 0);
            }
            image[*offset..end].copy_from_slice(bytes);
        }
        image
    }
}

fn name16(name: &str) -> [u8; 16] {
    let mut raw = [0u8; 16];
    let len = name.len().min(16);
    raw[..len].copy_from_slice(&name.as_bytes()[..len]);
    raw
}
