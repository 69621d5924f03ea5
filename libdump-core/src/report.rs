//! Text rendering of decoded load commands.
//!
//! The layout (column widths, banner lines and labels) is kept byte-for-byte
//! stable so existing consumers of the text output keep working.

use crate::header::{Header, MachHeader64};
use crate::linkedit::{DyldInfo, LinkeditData};
use crate::records::Record;
use crate::sections::Section;
use crate::symbols::Symbol;
use serde::Serialize;
use std::io::{self, Write};

const NAME_WIDTH: usize = 60;
const VALUE_WIDTH: usize = 20;
const SIZE_WIDTH: usize = 12;

/// Everything one decode pass produced for an image.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub format: &'static str,
    pub file_type: &'static str,
    pub header: MachHeader64,
    pub records: Vec<Record>,
}

impl Report {
    pub fn new(header: MachHeader64, records: Vec<Record>) -> Self {
        Self {
            format: header.format_name(),
            file_type: header.file_type_name(),
            header,
            records,
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::SymbolTable { symbols } => Some(symbols),
                _ => None,
            })
            .flatten()
    }

    pub fn text_sections(&self) -> impl Iterator<Item = &Section> {
        self.records
            .iter()
            .filter_map(|record| match record {
                Record::Segment(segment) => Some(segment.text_sections()),
                _ => None,
            })
            .flatten()
    }
}

/// Writes every record of `report` in command order.
pub fn render_text<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    for record in &report.records {
        match record {
            Record::SymbolTable { symbols } => render_symbols(symbols, out)?,
            Record::Segment(segment) => {
                for section in segment.text_sections() {
                    render_text_section(section, out)?;
                }
            }
            Record::DyldInfo(info) => render_dyld_info(info, out)?,
            Record::CodeSignature(data) => render_linkedit(
                "----------------------Code Signature----------------------",
                "Code signature",
                data,
                out,
            )?,
            Record::FunctionStarts(data) => render_linkedit(
                "----------------------Function Starts----------------------",
                "Function starts",
                data,
                out,
            )?,
            Record::Unrecognized { .. } => {}
        }
    }
    Ok(())
}

/// Writes the Name/Value/Size table: a header row, a separator row and one
/// row per symbol.
pub fn render_symbols<W: Write>(symbols: &[Symbol], out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{:<NAME_WIDTH$}{:<VALUE_WIDTH$}{:<SIZE_WIDTH$}",
        "Name", "Value", "Size"
    )?;
    writeln!(
        out,
        "{}{}{}",
        "-".repeat(NAME_WIDTH),
        "-".repeat(VALUE_WIDTH),
        "-".repeat(SIZE_WIDTH)
    )?;
    for symbol in symbols {
        writeln!(
            out,
            "{:<NAME_WIDTH$}{:<VALUE_WIDTH$}{:<SIZE_WIDTH$}",
            symbol.name,
            symbol.value.to_string(),
            symbol.size.to_string()
        )?;
    }
    Ok(())
}

fn render_text_section<W: Write>(section: &Section, out: &mut W) -> io::Result<()> {
    writeln!(out, "----------------------Text Section----------------------")?;
    writeln!(out, "Text section: ")?;
    writeln!(out, "Address: {:x}", section.addr)?;
    writeln!(out, "Size: {}", section.size)?;
    writeln!(out, "--------------------------------------------------------")
}

fn render_dyld_info<W: Write>(info: &DyldInfo, out: &mut W) -> io::Result<()> {
    writeln!(out, "----------------------Dyld Info----------------------")?;
    writeln!(out, "Rebase offest: {}", info.rebase_off)?;
    writeln!(out, "Rebase size: {}", info.rebase_size)?;
    writeln!(out, "Bind offest: {}", info.bind_off)?;
    writeln!(out, "Bind size: {}", info.bind_size)?;
    writeln!(out, "Weak bind offest: {}", info.weak_bind_off)?;
    writeln!(out, "Weak bind size: {}", info.weak_bind_size)?;
    writeln!(out, "Lazy bind offest: {}", info.lazy_bind_off)?;
    writeln!(out, "Lazy bind size: {}", info.lazy_bind_size)?;
    writeln!(out, "Export offest: {}", info.export_off)?;
    writeln!(out, "Export size: {}", info.export_size)?;
    writeln!(out, "-----------------------------------------------------")
}

fn render_linkedit<W: Write>(
    banner: &str,
    label: &str,
    data: &LinkeditData,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "{banner}")?;
    writeln!(out, "{label} offest: {}", data.dataoff)?;
    writeln!(out, "{label} size: {}", data.datasize)?;
    writeln!(out, "----------------------------------------------------------")
}
