use crate::load_command::RawCommand;
use crate::view::{fixed_name, ImageView};
use crate::{DumpError, Result};
use goblin::mach::load_command::{SIZEOF_SECTION_64, SIZEOF_SEGMENT_COMMAND_64};
use serde::Serialize;

pub const TEXT_SECTION: &str = "__text";

/// A `section_64` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub sectname: String,
    pub segname: String,
    pub addr: u64,
    pub size: u64,
}

impl Section {
    pub fn is_text(&self) -> bool {
        self.sectname == TEXT_SECTION
    }
}

/// A `segment_command_64` with the section descriptors that follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub segname: String,
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub sections: Vec<Section>,
}

impl Segment {
    /// Decodes the segment and exactly `nsects` sections, which must all fit
    /// inside the command's own `cmdsize`.
    pub fn parse(view: &ImageView<'_>, raw: &RawCommand) -> Result<Self> {
        let cmdsize = raw.cmdsize as usize;
        if cmdsize < SIZEOF_SEGMENT_COMMAND_64 {
            return Err(DumpError::malformed(
                raw.offset,
                format!("LC_SEGMENT_64 cmdsize {cmdsize} is too small"),
            ));
        }

        let mut fields = view.fields(raw.offset + 8, SIZEOF_SEGMENT_COMMAND_64 - 8)?;
        let segname = fixed_name(&fields.name16()?);
        let vmaddr = fields.u64()?;
        let vmsize = fields.u64()?;
        let fileoff = fields.u64()?;
        let filesize = fields.u64()?;
        let _maxprot = fields.u32()?;
        let _initprot = fields.u32()?;
        let nsects = fields.u32()? as usize;

        let needed = nsects
            .checked_mul(SIZEOF_SECTION_64)
            .and_then(|n| n.checked_add(SIZEOF_SEGMENT_COMMAND_64))
            .filter(|&n| n <= cmdsize)
            .ok_or_else(|| {
                DumpError::malformed(
                    raw.offset,
                    format!("{segname}: {nsects} sections do not fit in cmdsize {cmdsize}"),
                )
            })?;
        log::debug!("Segment {segname}: {nsects} sections in {needed} bytes");

        let mut sections = Vec::with_capacity(nsects);
        let mut offset = raw.offset + SIZEOF_SEGMENT_COMMAND_64;
        for _ in 0..nsects {
            let mut fields = view.fields(offset, SIZEOF_SECTION_64)?;
            sections.push(Section {
                sectname: fixed_name(&fields.name16()?),
                segname: fixed_name(&fields.name16()?),
                addr: fields.u64()?,
                size: fields.u64()?,
            });
            offset += SIZEOF_SECTION_64;
        }

        Ok(Self {
            segname,
            vmaddr,
            vmsize,
            fileoff,
            filesize,
            sections,
        })
    }

    pub fn text_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_text())
    }
}
