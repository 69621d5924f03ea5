use crate::load_command::RawCommand;
use crate::view::ImageView;
use crate::{DumpError, Result};
use goblin::mach::load_command::SIZEOF_SYMTAB_COMMAND;
use goblin::mach::symbols::SIZEOF_NLIST_64;
use serde::Serialize;

/// One named entry of an image's symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    /// `n_value`, the symbol's address.
    pub value: u64,
    /// `n_desc`, shown under the "Size" column. It is descriptor bits (weak
    /// definition, library ordinal, ...) and not a byte count.
    pub size: u16,
}

/// Decoded `symtab_command`.
#[derive(Debug, Clone, Copy)]
pub struct SymtabCommand {
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

impl SymtabCommand {
    pub fn parse(view: &ImageView<'_>, raw: &RawCommand) -> Result<Self> {
        if (raw.cmdsize as usize) < SIZEOF_SYMTAB_COMMAND {
            return Err(DumpError::malformed(
                raw.offset,
                format!("LC_SYMTAB cmdsize {} is too small", raw.cmdsize),
            ));
        }
        let mut fields = view.fields(raw.offset + 8, SIZEOF_SYMTAB_COMMAND - 8)?;
        Ok(Self {
            symoff: fields.u32()?,
            nsyms: fields.u32()?,
            stroff: fields.u32()?,
            strsize: fields.u32()?,
        })
    }

    /// Reads every entry with a non-zero string index, in table order.
    pub fn symbols(&self, view: &ImageView<'_>) -> Result<Vec<Symbol>> {
        let symoff = self.symoff as usize;
        let table_len = (self.nsyms as usize)
            .checked_mul(SIZEOF_NLIST_64)
            .ok_or_else(|| DumpError::malformed(symoff, "symbol count overflows"))?;
        // Checks the whole array up front so a bad count fails before any entry is read.
        view.bytes_at(symoff, table_len)?;

        let stroff = self.stroff as usize;
        let strend = stroff
            .checked_add(self.strsize as usize)
            .ok_or_else(|| DumpError::malformed(stroff, "string table overflows"))?;

        let mut symbols = Vec::new();
        for i in 0..self.nsyms as usize {
            let mut entry = view.fields(symoff + i * SIZEOF_NLIST_64, SIZEOF_NLIST_64)?;
            let n_strx = entry.u32()?;
            let _n_type = entry.u8()?;
            let _n_sect = entry.u8()?;
            let n_desc = entry.u16()?;
            let n_value = entry.u64()?;

            if n_strx == 0 {
                continue;
            }

            let name = view.cstr_at(stroff + n_strx as usize, strend)?;
            symbols.push(Symbol {
                name: String::from_utf8_lossy(name).to_string(),
                value: n_value,
                size: n_desc,
            });
        }

        log::info!(
            "Decoded {} named symbols out of {} entries",
            symbols.len(),
            self.nsyms
        );
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{identify, MachHeader64};
    use crate::load_command::LoadCommands;
    use crate::testutil::ImageBuilder;

    fn decode(image: &[u8]) -> Result<Vec<Symbol>> {
        let view = identify(image).unwrap();
        let header = MachHeader64::parse(&view).unwrap();
        let raw = LoadCommands::new(view, &header).next().unwrap().unwrap();
        SymtabCommand::parse(&view, &raw)?.symbols(&view)
    }

    #[test]
    fn test_skips_entries_without_name() {
        let b = ImageBuilder::new();
        let entries = [b.nlist(0, 0xdead, 9), b.nlist(1, 0x1000, 4)].concat();
        let strtab = b"\0foo\0".to_vec();
        let image = b
            .symtab(0x100, 2, 0x200, strtab.len() as u32)
            .data_at(0x100, entries)
            .data_at(0x200, strtab)
            .build();

        let symbols = decode(&image).unwrap();
        assert_eq!(
            symbols,
            vec![Symbol {
                name: "foo".to_string(),
                value: 4096,
                size: 4,
            }]
        );
    }

    #[test]
    fn test_keeps_entry_order() {
        let b = ImageBuilder::new();
        let entries = [
            b.nlist(5, 0x30, 0),
            b.nlist(1, 0x10, 0),
            b.nlist(9, 0x20, 0x100),
        ]
        .concat();
        let strtab = b"\0_bb\0_aa\0_cc\0".to_vec();
        let image = b
            .symtab(0x100, 3, 0x200, strtab.len() as u32)
            .data_at(0x100, entries)
            .data_at(0x200, strtab)
            .build();

        let names: Vec<_> = decode(&image)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["_aa", "_bb", "_cc"]);
    }

    #[test]
    fn test_swapped_image_decodes_same_symbols() {
        let b = ImageBuilder::new().big_endian();
        let entries = b.nlist(1, 0x1000, 4);
        let strtab = b"\0foo\0".to_vec();
        let image = b
            .symtab(0x100, 1, 0x200, strtab.len() as u32)
            .data_at(0x100, entries)
            .data_at(0x200, strtab)
            .build();

        let symbols = decode(&image).unwrap();
        assert_eq!(symbols[0].value, 0x1000);
        assert_eq!(symbols[0].size, 4);
    }

    #[test]
    fn test_symbol_array_past_end_is_malformed() {
        let b = ImageBuilder::new();
        let image = b
            .symtab(0x100, 1000, 0x200, 4)
            .data_at(0x200, b"\0ab\0".to_vec())
            .build();

        assert!(matches!(
            decode(&image),
            Err(DumpError::MalformedRecord { offset: 0x100, .. })
        ));
    }

    #[test]
    fn test_name_outside_string_table_is_malformed() {
        let b = ImageBuilder::new();
        let entries = b.nlist(64, 0x1000, 0);
        let image = b
            .symtab(0x100, 1, 0x200, 8)
            .data_at(0x100, entries)
            .data_at(0x200, b"\0foo\0bar".to_vec())
            .data_at(0x300, vec![0u8; 64])
            .build();

        assert!(matches!(decode(&image), Err(DumpError::MalformedRecord { .. })));
    }

    #[test]
    fn test_unterminated_name_is_malformed() {
        let b = ImageBuilder::new();
        let entries = b.nlist(1, 0x1000, 0);
        let image = b
            .symtab(0x100, 1, 0x200, 4)
            .data_at(0x100, entries)
            .data_at(0x200, b"\0foobar\0".to_vec())
            .build();

        assert!(matches!(decode(&image), Err(DumpError::MalformedRecord { .. })));
    }

    #[test]
    fn test_short_symtab_command_is_malformed() {
        let image = ImageBuilder::new()
            .command(goblin::mach::load_command::LC_SYMTAB, &[0u8; 8])
            .build();
        assert!(matches!(
            decode(&image),
            Err(DumpError::MalformedRecord { offset: 32, .. })
        ));
    }
}
