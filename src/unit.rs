//! Compilation-unit header iteration over `.debug_info`.

use crate::abbrev::AbbrevTable;
use crate::error::{Error, Result};
use crate::reader::Reader;

/// DWARF unit-type for a normal ("full") compile unit, DWARF 5 §7.5.1.1.
const DW_UT_COMPILE: u8 = 1;

/// One parsed compilation-unit header, plus its abbreviation table.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Absolute offset of this unit's length field within `.debug_info`.
    pub offset: usize,
    /// Total byte span of the unit, including the length field itself.
    pub length: usize,
    /// Absolute offset of the root DIE within `.debug_info`.
    pub root_die_offset: usize,
    pub version: u16,
    pub address_size: u8,
    pub abbrev: AbbrevTable,
}

/// Iterate every compilation-unit header in `debug_info`, parsing each
/// unit's abbreviation table out of `debug_abbrev` along the way.
pub fn parse_units(debug_info: &[u8], debug_abbrev: &[u8]) -> Result<Vec<CompilationUnit>> {
    let mut units = Vec::new();
    let mut offset = 0usize;

    while offset < debug_info.len() {
        let mut header = Reader::new(&debug_info[offset..]);

        let unit_length = header.u32()?;
        if unit_length == 0xffff_ffff {
            return Err(Error::Unsupported64BitDwarf);
        }
        let version = header.u16()?;

        let (abbrev_offset, address_size, local_root_offset) = match version {
            4 => {
                let abbrev_offset = header.u32()?;
                let address_size = header.u8()?;
                (abbrev_offset, address_size, 11)
            }
            5 => {
                let unit_type = header.u8()?;
                if unit_type != DW_UT_COMPILE {
                    return Err(Error::Malformed("only DW_UT_compile units are supported"));
                }
                let address_size = header.u8()?;
                let abbrev_offset = header.u32()?;
                (abbrev_offset, address_size, 12)
            }
            other => return Err(Error::UnsupportedDwarfVersion(other)),
        };

        if address_size != 8 {
            return Err(Error::Malformed("only 8-byte addresses are supported"));
        }

        let abbrev_start = abbrev_offset as usize;
        if abbrev_start > debug_abbrev.len() {
            return Err(Error::Malformed("abbrev offset out of range"));
        }
        let mut abbrev_reader = Reader::new(&debug_abbrev[abbrev_start..]);
        let abbrev = AbbrevTable::parse(&mut abbrev_reader)?;

        let length = 4 + unit_length as usize;
        if offset + length > debug_info.len() {
            return Err(Error::Malformed("compilation unit overruns debug_info"));
        }

        units.push(CompilationUnit {
            offset,
            length,
            root_die_offset: offset + local_root_offset,
            version,
            address_size,
            abbrev,
        });

        offset += length;
    }

    Ok(units)
}
