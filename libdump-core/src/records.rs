use crate::linkedit::{DyldInfo, LinkeditData};
use crate::load_command::RawCommand;
use crate::sections::Segment;
use crate::symbols::{Symbol, SymtabCommand};
use crate::view::ImageView;
use crate::Result;
use goblin::mach::load_command::{
    LC_CODE_SIGNATURE, LC_DYLD_INFO_ONLY, LC_FUNCTION_STARTS, LC_SEGMENT_64, LC_SYMTAB,
};
use serde::Serialize;

/// A decoded load command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// LC_SYMTAB, resolved to its named entries
    SymbolTable { symbols: Vec<Symbol> },
    /// LC_SEGMENT_64
    Segment(Segment),
    /// LC_DYLD_INFO_ONLY
    DyldInfo(DyldInfo),
    /// LC_CODE_SIGNATURE
    CodeSignature(LinkeditData),
    /// LC_FUNCTION_STARTS
    FunctionStarts(LinkeditData),
    /// Any other command; kept so the walk order stays visible
    Unrecognized { cmd: u32, cmdsize: u32 },
}

impl Record {
    /// Decodes one command located by the walker. Table-bearing commands
    /// read their tables from `view`.
    pub fn decode(view: &ImageView<'_>, raw: &RawCommand) -> Result<Self> {
        let record = match raw.cmd {
            LC_SYMTAB => Self::SymbolTable {
                symbols: SymtabCommand::parse(view, raw)?.symbols(view)?,
            },
            LC_SEGMENT_64 => Self::Segment(Segment::parse(view, raw)?),
            LC_DYLD_INFO_ONLY => Self::DyldInfo(DyldInfo::parse(view, raw)?),
            LC_CODE_SIGNATURE => Self::CodeSignature(LinkeditData::parse(view, raw)?),
            LC_FUNCTION_STARTS => Self::FunctionStarts(LinkeditData::parse(view, raw)?),
            cmd => Self::Unrecognized {
                cmd,
                cmdsize: raw.cmdsize,
            },
        };
        Ok(record)
    }
}
