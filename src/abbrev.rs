//! Per-compilation-unit abbreviation tables.
//!
//! An abbreviation declares the shape of every DIE that references it by
//! code: its tag, whether it has children, and the ordered `(name, form)`
//! list of attributes. Rather than a `HashMap<u64, Abbreviation>` per CU
//! (gimli's own `Abbreviations` type), entries are packed into one `Vec<u8>`
//! with a parallel offset index, decoded on lookup.

use crate::dwarf::{AttributeForm, AttributeName, Tag};
use crate::error::{Error, Result};
use crate::reader::Reader;

/// One `(name, form)` pair of an abbrev's attribute list, plus the constant
/// value carried inline when `form` is `DW_FORM_implicit_const`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: AttributeName,
    pub form: AttributeForm,
    pub implicit_const: Option<i64>,
}

/// A fully decoded abbreviation entry.
#[derive(Debug, Clone)]
pub struct Abbrev {
    pub tag: Tag,
    pub has_children: bool,
    pub attrs: Vec<AttributeSpec>,
}

const HEADER_LEN: usize = 9;
const ATTR_LEN: usize = 16;

fn write_entry(
    data: &mut Vec<u8>,
    tag_code: u64,
    has_children: bool,
    attrs: &[(u64, u64, Option<i64>)],
) {
    data.extend_from_slice(&(tag_code as u32).to_le_bytes());
    data.push(has_children as u8);
    data.extend_from_slice(&(attrs.len() as u32).to_le_bytes());
    for &(name, form, implicit_const) in attrs {
        data.extend_from_slice(&(name as u32).to_le_bytes());
        data.extend_from_slice(&(form as u32).to_le_bytes());
        data.extend_from_slice(&implicit_const.unwrap_or(0).to_le_bytes());
    }
}

fn decode_entry(data: &[u8], offset: usize) -> Abbrev {
    let tag_code = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as u64;
    let has_children = data[offset + 4] != 0;
    let attr_count =
        u32::from_le_bytes(data[offset + 5..offset + HEADER_LEN].try_into().unwrap()) as usize;
    let mut attrs = Vec::with_capacity(attr_count);
    let mut p = offset + HEADER_LEN;
    for _ in 0..attr_count {
        let name = u32::from_le_bytes(data[p..p + 4].try_into().unwrap()) as u64;
        let form = u32::from_le_bytes(data[p + 4..p + 8].try_into().unwrap()) as u64;
        let implicit_const = i64::from_le_bytes(data[p + 8..p + ATTR_LEN].try_into().unwrap());
        p += ATTR_LEN;
        let form_enum =
            AttributeForm::from_u64(form).expect("form was validated when the table was parsed");
        attrs.push(AttributeSpec {
            name: AttributeName::from_u64(name),
            form: form_enum,
            implicit_const: if form_enum == AttributeForm::ImplicitConst {
                Some(implicit_const)
            } else {
                None
            },
        });
    }
    Abbrev {
        tag: Tag::from_u64(tag_code),
        has_children,
        attrs,
    }
}

/// A compilation unit's abbreviation table, indexed by code.
#[derive(Debug, Clone)]
pub struct AbbrevTable {
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl AbbrevTable {
    /// Parse one table out of `.debug_abbrev`, starting wherever `reader` is
    /// currently positioned (the CU's abbrev-section offset) and reading
    /// until the code-0 terminator.
    pub fn parse(reader: &mut Reader) -> Result<AbbrevTable> {
        let mut data = Vec::new();
        let mut offsets = vec![0u32];
        write_entry(&mut data, 0, false, &[]);

        let mut expected_code = 1u64;
        loop {
            let code = reader.leb128()?;
            if code == 0 {
                break;
            }
            if code != expected_code {
                return Err(Error::Malformed("abbrev code out of sequence"));
            }

            let tag_code = reader.leb128()?;
            let has_children = reader.u8()? != 0;

            let mut attrs = Vec::new();
            loop {
                let name = reader.leb128()?;
                let form = reader.leb128()?;
                if name == 0 && form == 0 {
                    break;
                }
                let form_enum =
                    AttributeForm::from_u64(form).ok_or(Error::UnknownForm(form))?;
                let implicit_const = if form_enum == AttributeForm::ImplicitConst {
                    Some(reader.leb128s()?)
                } else {
                    None
                };
                attrs.push((name, form, implicit_const));
            }

            offsets.push(data.len() as u32);
            write_entry(&mut data, tag_code, has_children, &attrs);
            expected_code += 1;
        }

        Ok(AbbrevTable { data, offsets })
    }

    /// Look up the abbreviation for `code`, or `None` if it was never
    /// declared in this table.
    pub fn get(&self, code: u64) -> Option<Abbrev> {
        let offset = *self.offsets.get(code as usize)? as usize;
        Some(decode_entry(&self.data, offset))
    }

    /// Number of declared abbreviations, not counting the code-0 sentinel.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
