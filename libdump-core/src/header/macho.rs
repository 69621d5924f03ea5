use crate::header::Header;
use crate::view::ImageView;
use crate::Result;
use goblin::mach::header::{filetype_to_str, SIZEOF_HEADER_64};
use serde::Serialize;

/// Represents the Mach-O header of a 64-bit image.
///
/// This structure corresponds to `mach_header_64` from `<mach-o/loader.h>`.
/// It sits at offset 0 of every image, whether read from disk or from the
/// address a dynamic loader mapped it at, and is immediately followed by
/// `ncmds` load commands.
#[repr(C)]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MachHeader64 {
    /// Magic number, `MH_MAGIC_64` or its byte-swapped form.
    pub magic: u32,

    /// CPU type. Opaque to the decoder.
    pub cputype: u32,

    /// CPU subtype. Opaque to the decoder.
    pub cpusubtype: u32,

    /// File type (e.g. `MH_EXECUTE`, `MH_DYLIB`, `MH_BUNDLE`).
    pub filetype: u32,

    /// Number of load commands.
    ///
    /// The commands carry no terminator, so this count is the only thing
    /// that bounds the walk.
    pub ncmds: u32,

    /// Total size in bytes of all load commands.
    pub sizeofcmds: u32,

    /// Flags (`MH_DYLDLINK`, `MH_PIE`, `MH_TWOLEVEL`, ...).
    pub flags: u32,

    /// Reserved.
    pub reserved: u32,
}

impl MachHeader64 {
    /// Reads the header at the start of `view`. The magic is assumed to have
    /// been checked when the view was created.
    pub fn parse(view: &ImageView<'_>) -> Result<Self> {
        let mut fields = view.fields(0, SIZEOF_HEADER_64)?;
        Ok(Self {
            magic: fields.u32()?,
            cputype: fields.u32()?,
            cpusubtype: fields.u32()?,
            filetype: fields.u32()?,
            ncmds: fields.u32()?,
            sizeofcmds: fields.u32()?,
            flags: fields.u32()?,
            reserved: fields.u32()?,
        })
    }
}

impl Header for MachHeader64 {
    fn command_count(&self) -> u32 {
        self.ncmds
    }

    fn commands_size(&self) -> u32 {
        self.sizeofcmds
    }

    fn header_size(&self) -> usize {
        SIZEOF_HEADER_64
    }

    fn format_name(&self) -> &'static str {
        "Mach-O 64"
    }

    fn file_type_name(&self) -> &'static str {
        filetype_to_str(self.filetype)
    }
}
