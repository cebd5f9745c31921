//! Builds a [`Printer`] for a type DIE, memoized per `(cu_idx, die_offset)`
//! for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::die::{Die, DieCursor};
use crate::dwarf::{normalize_encoding, AttributeName, Signedness, Tag};
use crate::error::{Error, Result};
use crate::format;
use crate::loader::DebugData;
use crate::typeinfo::{EnumInfo, Printer, StructInfo, StructMember, TypeInfo};
use crate::unit::CompilationUnit;

type CacheKey = (usize, usize);

static PRINTER_CACHE: OnceCell<Mutex<HashMap<CacheKey, Printer>>> = OnceCell::new();

fn cache() -> &'static Mutex<HashMap<CacheKey, Printer>> {
    PRINTER_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) fn resolve_ref(cu: &CompilationUnit, die: &Die, name: AttributeName) -> Option<usize> {
    die.get_offset(name).map(|v| cu.offset + v as usize)
}

/// Build (or return the cached) printer for the type DIE at `die_offset`
/// within `data.units[cu_idx]`. Idempotent: repeated calls for the same key
/// return the same `Printer` (same function pointer, same `Arc` identity).
pub fn load_printer(data: &'static DebugData, cu_idx: usize, die_offset: usize) -> Result<Printer> {
    let key = (cu_idx, die_offset);
    if let Some(p) = cache().lock().unwrap().get(&key) {
        return Ok(p.clone());
    }

    let printer = build_printer(data, cu_idx, die_offset)?;

    cache().lock().unwrap().insert(key, printer.clone());
    Ok(printer)
}

fn build_printer(data: &'static DebugData, cu_idx: usize, die_offset: usize) -> Result<Printer> {
    let cu = &data.units[cu_idx];
    let cursor = DieCursor::new(data.debug_info());
    let die = cursor.load(cu, die_offset)?;

    Ok(match die.tag {
        Tag::EnumerationType => build_enum(data, cu_idx, &die)?,
        Tag::StructureType | Tag::ClassType => build_struct(data, cu_idx, &die)?,
        Tag::BaseType => build_base(&die),
        Tag::Typedef => {
            let target = resolve_ref(cu, &die, AttributeName::Type)
                .ok_or(Error::Malformed("typedef has no target type"))?;
            return load_printer(data, cu_idx, target);
        }
        Tag::PointerType => Printer {
            function: format::pointer_fn,
            info: Arc::new(TypeInfo::Pointer),
        },
        other => {
            log::warn!("librepr: no printer for DIE tag {:?} at offset {}", other, die_offset);
            Printer {
                function: format::fallback_fn,
                info: Arc::new(TypeInfo::Fallback),
            }
        }
    })
}

fn build_base(die: &Die) -> Printer {
    let encoding = die.get_unsigned(AttributeName::Encoding).unwrap_or(0);
    let byte_size = die.get_unsigned(AttributeName::ByteSize).unwrap_or(0);
    match format::base_printer_for(encoding, byte_size) {
        Some(function) => Printer {
            function,
            info: Arc::new(TypeInfo::Base),
        },
        None => {
            log::warn!(
                "librepr: unsupported base type (encoding={}, byte_size={})",
                encoding,
                byte_size
            );
            Printer {
                function: format::fallback_fn,
                info: Arc::new(TypeInfo::Fallback),
            }
        }
    }
}

fn build_enum(data: &'static DebugData, cu_idx: usize, die: &Die) -> Result<Printer> {
    let cu = &data.units[cu_idx];
    let cursor = DieCursor::new(data.debug_info());
    let name = die
        .get_cstring(AttributeName::Name, data.debug_str())
        .unwrap_or("")
        .to_string();

    let mut prim_offset = resolve_ref(cu, die, AttributeName::Type)
        .ok_or(Error::Malformed("enumeration has no underlying type"))?;
    let (encoding, byte_size) = loop {
        let prim = cursor.load(cu, prim_offset)?;
        if prim.tag == Tag::Typedef {
            prim_offset = resolve_ref(cu, &prim, AttributeName::Type)
                .ok_or(Error::Malformed("typedef has no target type"))?;
            continue;
        }
        let encoding = prim
            .get_unsigned(AttributeName::Encoding)
            .ok_or(Error::Malformed("enum's underlying type has no encoding"))?;
        let byte_size = prim
            .get_unsigned(AttributeName::ByteSize)
            .ok_or(Error::Malformed("enum's underlying type has no byte size"))?;
        break (encoding, byte_size);
    };
    let signedness = normalize_encoding(encoding).unwrap_or(Signedness::Unsigned);

    let mut enumerators = HashMap::new();
    if die.has_children {
        let mut offset = die.next_offset;
        loop {
            let child = cursor.load(cu, offset)?;
            if child.is_sentinel {
                break;
            }
            if child.tag != Tag::Enumerator {
                return Err(Error::Malformed(
                    "enumeration child is not an enumerator",
                ));
            }
            let ename = child
                .get_cstring(AttributeName::Name, data.debug_str())
                .ok_or(Error::Malformed("enumerator has no name"))?;
            let key = match signedness {
                Signedness::Signed => child
                    .get_signed(AttributeName::ConstValue)
                    .ok_or(Error::Malformed("enumerator has no const value"))?
                    as u64,
                Signedness::Unsigned => child
                    .get_unsigned(AttributeName::ConstValue)
                    .ok_or(Error::Malformed("enumerator has no const value"))?,
            };
            enumerators.insert(key, ename.to_string());
            offset = child.next_offset;
        }
    }

    Ok(Printer {
        function: format::enum_fn,
        info: Arc::new(TypeInfo::Enum(EnumInfo {
            name,
            signedness,
            byte_size: byte_size as u8,
            enumerators,
        })),
    })
}

fn collect_members(
    data: &'static DebugData,
    cu_idx: usize,
    die_offset: usize,
    base_offset: u64,
    members: &mut Vec<StructMember>,
) -> Result<()> {
    let cu = &data.units[cu_idx];
    let cursor = DieCursor::new(data.debug_info());
    let die = cursor.load(cu, die_offset)?;
    if !die.has_children {
        return Ok(());
    }

    let mut depth = 1i32;
    let mut offset = die.next_offset;
    loop {
        let child = cursor.load(cu, offset)?;

        if child.is_sentinel {
            depth -= 1;
            if depth == 0 {
                break;
            }
            offset = child.next_offset;
            continue;
        }

        if depth == 1 {
            match child.tag {
                Tag::Member => {
                    let name = child
                        .get_cstring(AttributeName::Name, data.debug_str())
                        .unwrap_or("")
                        .to_string();
                    let member_offset = child
                        .get_unsigned(AttributeName::DataMemberLocation)
                        .unwrap_or(0);
                    let type_offset = resolve_ref(cu, &child, AttributeName::Type)
                        .ok_or(Error::Malformed("member has no type"))?;
                    let printer = load_printer(data, cu_idx, type_offset)?;
                    members.push(StructMember {
                        name,
                        offset: base_offset + member_offset,
                        printer,
                    });
                }
                Tag::Inheritance => {
                    let added = child
                        .get_unsigned(AttributeName::DataMemberLocation)
                        .unwrap_or(0);
                    let base_die_offset = resolve_ref(cu, &child, AttributeName::Type)
                        .ok_or(Error::Malformed("inheritance has no base type"))?;
                    collect_members(
                        data,
                        cu_idx,
                        base_die_offset,
                        base_offset + added,
                        members,
                    )?;
                }
                _ => {}
            }
        }

        if child.has_children {
            depth += 1;
        }
        offset = child.next_offset;
    }

    Ok(())
}

fn build_struct(data: &'static DebugData, cu_idx: usize, die: &Die) -> Result<Printer> {
    let mut members = Vec::new();
    collect_members(data, cu_idx, die.offset, 0, &mut members)?;
    Ok(Printer {
        function: format::struct_fn,
        info: Arc::new(TypeInfo::Struct(StructInfo { members })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abbrev::AbbrevTable;
    use crate::loader::DebugData;
    use crate::reader::Reader;
    use crate::unit::CompilationUnit;

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

    fn leak(data: DebugData) -> &'static DebugData {
        Box::leak(Box::new(data))
    }

    fn cu(abbrev: AbbrevTable, length: usize) -> CompilationUnit {
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

    /// One compile unit: a base `int` type at offset X, a pointer-to-int
    /// type, a typedef chasing to the pointer, and a struct `{ int a; T* p; }`.
    #[test]
    fn builds_base_pointer_typedef_and_struct_plans() {
        let mut abbrev_buf = vec![];
        // 1: base_type, no children, name/strp encoding/data1 byte_size/data1
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x24));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0x3e));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 2: pointer_type, no children, type/ref4
        abbrev_buf.extend(uleb(2));
        abbrev_buf.extend(uleb(0x0f));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x49));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 3: typedef, no children, type/ref4
        abbrev_buf.extend(uleb(3));
        abbrev_buf.extend(uleb(0x16));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x49));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 4: structure_type, has_children, no attrs (name omitted for brevity)
        abbrev_buf.extend(uleb(4));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.push(1);
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 5: member, no children, name/strp data_member_location/data1 type/ref4
        abbrev_buf.extend(uleb(5));
        abbrev_buf.extend(uleb(0x0d));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0x38));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x49));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));

        let abbrev = parse_abbrev(&abbrev_buf);

        let debug_str = b"int\0a\0p\0".to_vec();

        let mut info = vec![];
        let base_offset = info.len();
        info.extend(uleb(1)); // base_type "int", code 1
        info.extend(0u32.to_le_bytes()); // name -> "int"
        info.push(5); // DW_ATE_signed
        info.push(4); // byte_size

        let ptr_offset = info.len();
        info.extend(uleb(2)); // pointer_type -> base
        info.extend((base_offset as u32).to_le_bytes());

        let typedef_offset = info.len();
        info.extend(uleb(3)); // typedef -> pointer
        info.extend((ptr_offset as u32).to_le_bytes());

        let struct_offset = info.len();
        info.extend(uleb(4)); // structure_type, code 4
        info.extend(uleb(5)); // member "a", code 5
        info.extend(4u32.to_le_bytes()); // name -> "a"
        info.push(0); // data_member_location = 0
        info.extend((base_offset as u32).to_le_bytes()); // type -> int
        info.extend(uleb(5)); // member "p", code 5
        info.extend(6u32.to_le_bytes()); // name -> "p"
        info.push(4); // data_member_location = 4
        info.extend((typedef_offset as u32).to_le_bytes()); // type -> typedef(pointer)
        info.push(0); // end of struct's children

        let units = vec![cu(abbrev, info.len())];
        let data = leak(DebugData::for_test(info, debug_str, units));

        let base_printer = load_printer(data, 0, base_offset).unwrap();
        assert!(matches!(*base_printer.info, TypeInfo::Base));

        let ptr_printer = load_printer(data, 0, ptr_offset).unwrap();
        assert!(matches!(*ptr_printer.info, TypeInfo::Pointer));

        let typedef_printer = load_printer(data, 0, typedef_offset).unwrap();
        assert!(matches!(*typedef_printer.info, TypeInfo::Pointer));

        let struct_printer = load_printer(data, 0, struct_offset).unwrap();
        match &*struct_printer.info {
            TypeInfo::Struct(s) => {
                assert_eq!(s.members.len(), 2);
                assert_eq!(s.members[0].name, "a");
                assert_eq!(s.members[0].offset, 0);
                assert_eq!(s.members[1].name, "p");
                assert_eq!(s.members[1].offset, 4);
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn load_printer_is_idempotent_for_the_same_key() {
        let mut abbrev_buf = vec![];
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x24));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x3e));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0)); // table terminator (this is the only entry)

        let abbrev = parse_abbrev(&abbrev_buf);
        let mut info = vec![];
        info.extend(uleb(1));
        info.push(7); // DW_ATE_unsigned
        info.push(4);

        let units = vec![cu(abbrev, info.len())];
        let data = leak(DebugData::for_test(info, vec![], units));

        let a = load_printer(data, 0, 0).unwrap();
        let b = load_printer(data, 0, 0).unwrap();
        assert_eq!(a.function as usize, b.function as usize);
        assert!(Arc::ptr_eq(&a.info, &b.info));
    }

    #[test]
    fn enum_plan_reads_enumerators_from_signed_underlying_type() {
        let mut abbrev_buf = vec![];
        // 1: base_type "int", signed, 4 bytes
        abbrev_buf.extend(uleb(1));
        abbrev_buf.extend(uleb(0x24));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x3e));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0x0b));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 2: enumeration_type, has_children, name/strp type/ref4
        abbrev_buf.extend(uleb(2));
        abbrev_buf.extend(uleb(0x04));
        abbrev_buf.push(1);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0x49));
        abbrev_buf.extend(uleb(0x13));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        // 3: enumerator, no children, name/strp const_value/sdata
        abbrev_buf.extend(uleb(3));
        abbrev_buf.extend(uleb(0x28));
        abbrev_buf.push(0);
        abbrev_buf.extend(uleb(0x03));
        abbrev_buf.extend(uleb(0x0e));
        abbrev_buf.extend(uleb(0x1c));
        abbrev_buf.extend(uleb(0x0d));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));
        abbrev_buf.extend(uleb(0));

        let abbrev = parse_abbrev(&abbrev_buf);
        let debug_str = b"Color\0Red\0".to_vec();

        let mut info = vec![];
        let base_offset = info.len();
        info.extend(uleb(1));
        info.push(5);
        info.push(4);

        let enum_offset = info.len();
        info.extend(uleb(2));
        info.extend(0u32.to_le_bytes()); // name -> "Color"
        info.extend((base_offset as u32).to_le_bytes());
        info.extend(uleb(3)); // enumerator "Red" = 1
        info.extend(6u32.to_le_bytes());
        info.extend(vec![1]); // sleb128 1
        info.push(0); // end of children

        let units = vec![cu(abbrev, info.len())];
        let data = leak(DebugData::for_test(info, debug_str, units));

        let printer = load_printer(data, 0, enum_offset).unwrap();
        match &*printer.info {
            TypeInfo::Enum(e) => {
                assert_eq!(e.name, "Color");
                assert_eq!(e.signedness, Signedness::Signed);
                assert_eq!(e.enumerators.get(&1u64).map(String::as_str), Some("Red"));
            }
            _ => panic!("expected enum"),
        }
    }
}
