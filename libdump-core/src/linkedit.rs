//! Load commands that only point at regions of `__LINKEDIT`.

use crate::load_command::RawCommand;
use crate::view::ImageView;
use crate::{DumpError, Result};
use goblin::mach::load_command::SIZEOF_LINKEDIT_DATA_COMMAND;
use serde::Serialize;

pub const SIZEOF_DYLD_INFO_COMMAND: usize = 48;

/// `dyld_info_command`: compressed dyld information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DyldInfo {
    pub rebase_off: u32,
    pub rebase_size: u32,
    pub bind_off: u32,
    pub bind_size: u32,
    pub weak_bind_off: u32,
    pub weak_bind_size: u32,
    pub lazy_bind_off: u32,
    pub lazy_bind_size: u32,
    pub export_off: u32,
    pub export_size: u32,
}

impl DyldInfo {
    pub fn parse(view: &ImageView<'_>, raw: &RawCommand) -> Result<Self> {
        require_size(raw, SIZEOF_DYLD_INFO_COMMAND)?;
        let mut fields = view.fields(raw.offset + 8, SIZEOF_DYLD_INFO_COMMAND - 8)?;
        Ok(Self {
            rebase_off: fields.u32()?,
            rebase_size: fields.u32()?,
            bind_off: fields.u32()?,
            bind_size: fields.u32()?,
            weak_bind_off: fields.u32()?,
            weak_bind_size: fields.u32()?,
            lazy_bind_off: fields.u32()?,
            lazy_bind_size: fields.u32()?,
            export_off: fields.u32()?,
            export_size: fields.u32()?,
        })
    }
}

/// `linkedit_data_command`: one (offset, size) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkeditData {
    pub dataoff: u32,
    pub datasize: u32,
}

impl LinkeditData {
    pub fn parse(view: &ImageView<'_>, raw: &RawCommand) -> Result<Self> {
        require_size(raw, SIZEOF_LINKEDIT_DATA_COMMAND)?;
        let mut fields = view.fields(raw.offset + 8, SIZEOF_LINKEDIT_DATA_COMMAND - 8)?;
        Ok(Self {
            dataoff: fields.u32()?,
            datasize: fields.u32()?,
        })
    }
}

fn require_size(raw: &RawCommand, min: usize) -> Result<()> {
    if (raw.cmdsize as usize) < min {
        return Err(DumpError::malformed(
            raw.offset,
            format!("{} cmdsize {} is below {min}", raw.name(), raw.cmdsize),
        ));
    }
    Ok(())
}
