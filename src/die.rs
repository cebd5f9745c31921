//! Forward-only traversal of Debugging Information Entries within a unit.

use crate::dwarf::{AttributeForm, AttributeName, Tag};
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::unit::CompilationUnit;

/// An attribute's decoded payload. Which variant is meaningful depends on
/// the attribute's `form`; the typed getters on [`Die`] know which to
/// expect for a given semantic use (a name, an offset, a count, ...).
#[derive(Debug, Clone, Copy)]
pub enum AttrData<'a> {
    /// The form's raw on-disk bytes (fixed-width integer, LEB128, or a
    /// block/exprloc's content with any length prefix already stripped).
    Bytes(&'a [u8]),
    /// `DW_FORM_string`: inline, NUL-terminated, NUL already stripped.
    Str(&'a str),
    /// `DW_FORM_strp` / `DW_FORM_line_strp`: an offset into a string table
    /// this crate may or may not have loaded.
    StrOffset(u32),
    /// `DW_FORM_implicit_const`: the constant lives in the abbrev, not the
    /// DIE stream.
    Implicit(i64),
    /// Zero-width marker form (`DW_FORM_flag_present`).
    Present,
}

/// One attribute of a DIE: its name, its form, and its decoded payload.
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub name: AttributeName,
    pub form: AttributeForm,
    pub data: AttrData<'a>,
}

/// A single DIE, with its attributes already decoded and a pointer to
/// wherever traversal should continue next (its first child if it has any,
/// otherwise its next sibling).
#[derive(Debug, Clone)]
pub struct Die<'a> {
    pub offset: usize,
    pub tag: Tag,
    pub has_children: bool,
    pub attrs: Vec<Attribute<'a>>,
    pub next_offset: usize,
    /// True for the abbrev-code-0 entry that terminates a children list.
    pub is_sentinel: bool,
}

impl<'a> Die<'a> {
    fn find(&self, name: AttributeName) -> Option<&Attribute<'a>> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// `Strp`/`String` only; `get_cstring` per spec.md's DIE cursor.
    pub fn get_cstring(&self, name: AttributeName, debug_str: &'a [u8]) -> Option<&'a str> {
        let attr = self.find(name)?;
        match attr.data {
            AttrData::Str(s) => Some(s),
            AttrData::StrOffset(off) if attr.form == AttributeForm::Strp => {
                let mut r = Reader::new(debug_str.get(off as usize..)?);
                r.cstr().ok()
            }
            _ => None,
        }
    }

    /// `Data1/2/4/8`, `Udata`, `Sdata`, `ImplicitConst`.
    pub fn get_unsigned(&self, name: AttributeName) -> Option<u64> {
        let attr = self.find(name)?;
        match attr.data {
            AttrData::Implicit(v) => Some(v as u64),
            AttrData::Bytes(b) => match attr.form {
                AttributeForm::Data1 => Some(b[0] as u64),
                AttributeForm::Data2 => Some(u16::from_le_bytes([b[0], b[1]]) as u64),
                AttributeForm::Data4 => {
                    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64)
                }
                AttributeForm::Data8 | AttributeForm::Addr => {
                    let mut a = [0u8; 8];
                    a.copy_from_slice(b);
                    Some(u64::from_le_bytes(a))
                }
                AttributeForm::Udata => Reader::new(b).leb128().ok(),
                AttributeForm::Sdata => Reader::new(b).leb128s().ok().map(|v| v as u64),
                _ => None,
            },
            _ => None,
        }
    }

    /// Like [`Die::get_unsigned`] but for signed widths.
    pub fn get_signed(&self, name: AttributeName) -> Option<i64> {
        let attr = self.find(name)?;
        match attr.data {
            AttrData::Implicit(v) => Some(v),
            AttrData::Bytes(b) => match attr.form {
                AttributeForm::Data1 => Some(b[0] as i8 as i64),
                AttributeForm::Data2 => Some(u16::from_le_bytes([b[0], b[1]]) as i16 as i64),
                AttributeForm::Data4 => {
                    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i32 as i64)
                }
                AttributeForm::Data8 => {
                    let mut a = [0u8; 8];
                    a.copy_from_slice(b);
                    Some(u64::from_le_bytes(a) as i64)
                }
                AttributeForm::Sdata => Reader::new(b).leb128s().ok(),
                AttributeForm::Udata => Reader::new(b).leb128().ok().map(|v| v as i64),
                _ => None,
            },
            _ => None,
        }
    }

    /// `SecOffset`→u32, `Ref4`→u32 (CU-relative), `Addr`→u64 (absolute),
    /// `Exprloc` recognized only as the single-opcode `[DW_OP_addr, addr]`
    /// program, per spec.md §4.5.
    pub fn get_offset(&self, name: AttributeName) -> Option<u64> {
        let attr = self.find(name)?;
        match (attr.form, attr.data) {
            (AttributeForm::SecOffset, AttrData::Bytes(b)) | (AttributeForm::Ref4, AttrData::Bytes(b)) => {
                Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64)
            }
            (AttributeForm::Addr, AttrData::Bytes(b)) => {
                let mut a = [0u8; 8];
                a.copy_from_slice(b);
                Some(u64::from_le_bytes(a))
            }
            (AttributeForm::Exprloc, AttrData::Bytes(b)) => {
                if b.len() == 9 && b[0] == 0x03 {
                    let mut a = [0u8; 8];
                    a.copy_from_slice(&b[1..9]);
                    Some(u64::from_le_bytes(a))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// `Block1` (content only, length prefix already stripped at decode
    /// time) and `Exprloc` (same).
    pub fn get_buffer(&self, name: AttributeName) -> Option<&'a [u8]> {
        let attr = self.find(name)?;
        match (attr.form, attr.data) {
            (AttributeForm::Block1, AttrData::Bytes(b))
            | (AttributeForm::Exprloc, AttrData::Bytes(b))
            | (AttributeForm::Block, AttrData::Bytes(b)) => Some(b),
            _ => None,
        }
    }
}

/// Consume one attribute value of `form` from `r`, returning its decoded
/// payload. Every `DW_FORM_*` this crate's [`crate::dwarf::AttributeForm`]
/// enumerates is handled, even forms whose value no getter interprets,
/// because an unhandled form would desynchronize every DIE that follows.
fn consume_into<'a>(
    r: &mut Reader<'a>,
    form: AttributeForm,
) -> Result<AttrData<'a>> {
    use AttributeForm::*;
    match form {
        FlagPresent => Ok(AttrData::Present),
        // The real constant is stored in the abbrev, not the DIE stream;
        // the caller patches this placeholder in afterward.
        ImplicitConst => Ok(AttrData::Implicit(0)),
        Addr | Data8 | Ref8 => Ok(AttrData::Bytes(r.sub(8)?)),
        Data16 => Ok(AttrData::Bytes(r.sub(16)?)),
        Data4 | Ref4 | SecOffset => Ok(AttrData::Bytes(r.sub(4)?)),
        LineStrp => {
            let b = r.sub(4)?;
            Ok(AttrData::StrOffset(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        }
        Strp => {
            let b = r.sub(4)?;
            Ok(AttrData::StrOffset(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        }
        Data2 | Strx2 => Ok(AttrData::Bytes(r.sub(2)?)),
        Data1 | Flag | Strx1 | Addrx1 => Ok(AttrData::Bytes(r.sub(1)?)),
        String => {
            let s = r.cstr()?;
            Ok(AttrData::Str(s))
        }
        Sdata | Udata | RefUdata | Addrx | Loclistx | Rnglistx => {
            let before = r.remaining();
            if form == Sdata {
                r.leb128s()?;
            } else {
                r.leb128()?;
            }
            let consumed = before.len() - r.remaining().len();
            Ok(AttrData::Bytes(&before[..consumed]))
        }
        Block1 => {
            let len = r.u8()? as usize;
            Ok(AttrData::Bytes(r.sub(len)?))
        }
        Block | Exprloc => {
            let len = r.leb128()? as usize;
            Ok(AttrData::Bytes(r.sub(len)?))
        }
    }
}

/// Load the DIE at `offset` (absolute within `debug_info`).
///
/// If the abbrev code is 0 this is the sentinel that terminates a children
/// list; `is_sentinel` is set and there are no attributes.
pub fn load_die<'a>(
    debug_info: &'a [u8],
    cu: &CompilationUnit,
    offset: usize,
) -> Result<Die<'a>> {
    let mut r = Reader::new(&debug_info[offset..]);
    let code = r.leb128()?;

    if code == 0 {
        let consumed = (debug_info.len() - offset) - r.remaining().len();
        return Ok(Die {
            offset,
            tag: Tag::Unknown(0),
            has_children: false,
            attrs: Vec::new(),
            next_offset: offset + consumed,
            is_sentinel: true,
        });
    }

    let abbrev = cu
        .abbrev
        .get(code)
        .ok_or(Error::Malformed("DIE references an undeclared abbrev code"))?;

    let mut attrs = Vec::with_capacity(abbrev.attrs.len());
    for spec in &abbrev.attrs {
        let mut data = consume_into(&mut r, spec.form)?;
        if let AttrData::Implicit(_) = data {
            data = AttrData::Implicit(spec.implicit_const.unwrap_or(0));
        }
        attrs.push(Attribute {
            name: spec.name,
            form: spec.form,
            data,
        });
    }

    let consumed = (debug_info.len() - offset) - r.remaining().len();
    Ok(Die {
        offset,
        tag: abbrev.tag,
        has_children: abbrev.has_children,
        attrs,
        next_offset: offset + consumed,
        is_sentinel: false,
    })
}

/// Advances from one DIE to the next in document order (depth-first:
/// children before siblings), stopping at the end of the owning CU.
pub struct DieCursor<'a> {
    debug_info: &'a [u8],
}

impl<'a> DieCursor<'a> {
    pub fn new(debug_info: &'a [u8]) -> DieCursor<'a> {
        DieCursor { debug_info }
    }

    pub fn load(&self, cu: &CompilationUnit, offset: usize) -> Result<Die<'a>> {
        load_die(self.debug_info, cu, offset)
    }

    /// The DIE immediately following `die` in document order, or `None` if
    /// `die` was the last one in its CU.
    pub fn next(&self, cu: &CompilationUnit, die: &Die<'a>) -> Result<Option<Die<'a>>> {
        let end = cu.offset + cu.length;
        if die.next_offset >= end {
            return Ok(None);
        }
        Ok(Some(self.load(cu, die.next_offset)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abbrev::AbbrevTable;

    fn uleb(mut n: u64) -> Vec<u8> {
        let mut out = vec![];
        loop {
            let mut byte = (n & 0x7f) as u8;
            n >>= 7;
            if n != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if n == 0 {
                break;
            }
        }
        out
    }

    fn cu_with_abbrev(abbrev: AbbrevTable, length: usize) -> CompilationUnit {
        CompilationUnit {
            offset: 0,
            length,
            root_die_offset: 0,
            version: 5,
            address_size: 8,
            abbrev,
        }
    }

    fn parse_abbrev(buf: &[u8]) -> AbbrevTable {
        let mut r = Reader::new(buf);
        AbbrevTable::parse(&mut r).unwrap()
    }

    #[test]
    fn reads_a_struct_die_with_a_strp_name_and_one_member_child() {
        // abbrev 1: structure_type, has_children, DW_AT_name/DW_FORM_strp
        // abbrev 2: member, no children, DW_AT_name/strp, DW_AT_data_member_location/data1
        let mut abbrev_buf = vec![];
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.push(1);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(2));
        abbrev_buf.extend(uleb(0x0d));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0x38));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));

        let abbrev = parse_abbrev(&abbrev_buf);

        let debug_str = b"Point\0x\0";

        let mut info = vec![];
        info.extend(uleb(1)); // struct DIE, code 1
        info.extend(0u32.to_le_bytes()); // name -> "Point" at offset 0
        info.extend(uleb(2)); // member DIE, code 2
        info.extend(6u32.to_le_bytes()); // name -> "x" at offset 6
        info.push(0); // data_member_location = 0
        info.push(0); // end-of-children sentinel

        let cu = cu_with_abbrev(abbrev, info.len());
        let cursor = DieCursor::new(&info);

        let root = cursor.load(&cu, 0).unwrap();
        assert_eq!(root.tag, Tag::StructureType);
        assert!(root.has_children);
        assert_eq!(root.get_cstring(AttributeName::Name, debug_str), Some("Point"));

        let member = cursor.next(&cu, &root).unwrap().unwrap();
        assert_eq!(member.tag, Tag::Member);
        assert!(!member.has_children);
        assert_eq!(member.get_cstring(AttributeName::Name, debug_str), Some("x"));
        assert_eq!(member.get_unsigned(AttributeName::DataMemberLocation), Some(0));

        let sentinel = cursor.next(&cu, &member).unwrap().unwrap();
        assert!(sentinel.is_sentinel);

        assert!(cursor.next(&cu, &sentinel).unwrap().is_none());
    }

    #[test]
    fn exprloc_single_dw_op_addr_resolves_as_offset() {
        let mut abbrev_buf = vec![];
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x34)); // variable
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x02)); // DW_AT_location
        abbrev_buf.extend(uleb(0x18)); // DW_FORM_exprloc
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));

        let abbrev = parse_abbrev(&abbrev_buf);

        let mut info = vec![];
        info.extend(uleb(1));
        info.extend(uleb(9)); // exprloc length
        info.push(0x03); // DW_OP_addr
        info.extend(0x4000_1234u64.to_le_bytes());

        let cu = cu_with_abbrev(abbrev, info.len());
        let cursor = DieCursor::new(&info);
        let die = cursor.load(&cu, 0).unwrap();
        assert_eq!(die.get_offset(AttributeName::Location), Some(0x4000_1234));
    }

    #[test]
    fn implicit_const_is_read_back_as_unsigned_and_signed() {
        let mut abbrev_buf = vec![];
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x28)); // enumerator
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x1c)); // const_value
        abbrev_buf.extend(uleb(0x21)); // implicit_const
        abbrev_buf.push(0x7e); // sleb128 -2
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));

        let abbrev = parse_abbrev(&abbrev_buf);

        let mut info = vec![];
        info.extend(uleb(1));

        let cu = cu_with_abbrev(abbrev, info.len());
        let cursor = DieCursor::new(&info);
        let die = cursor.load(&cu, 0).unwrap();
        assert_eq!(die.get_signed(AttributeName::ConstValue), Some(-2));
    }

    #[test]
    fn unknown_abbrev_code_in_stream_is_malformed() {
        let abbrev = parse_abbrev(&{
            let mut b = vec![];
            b.extend(uleb(0));
            b
        });
        let mut info = vec![];
        info.extend(uleb(5));
        let cu = cu_with_abbrev(abbrev, info.len());
        let cursor = DieCursor::new(&info);
        assert!(matches!(cursor.load(&cu, 0), Err(Error::Malformed(_))));
    }
}
