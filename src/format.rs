//! Rendering functions: one per printer "shape". `TypeInfo::Base` and
//! `TypeInfo::Pointer` carry no payload (per spec.md §3), so distinct
//! numeric base-type shapes are necessarily distinct function items rather
//! than one function branching on a field.

use std::fmt::Write as _;

use crate::dwarf::{encoding, Signedness};
use crate::typeinfo::TypeInfo;

unsafe fn read_bytes(value: *const u8, width: u8) -> u64 {
    let mut buf = [0u8; 8];
    std::ptr::copy_nonoverlapping(value, buf.as_mut_ptr(), width as usize);
    u64::from_ne_bytes(buf)
}

unsafe fn read_signed(value: *const u8, width: u8) -> i64 {
    let raw = read_bytes(value, width);
    let shift = 64 - width as u32 * 8;
    ((raw << shift) as i64) >> shift
}

fn write_signed(out: &mut String, value: *const u8, width: u8) {
    let v = unsafe { read_signed(value, width) };
    let _ = write!(out, "{}", v);
}

fn write_unsigned(out: &mut String, value: *const u8, width: u8) {
    let v = unsafe { read_bytes(value, width) };
    let _ = write!(out, "{}", v);
}

pub fn signed_1(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_signed(out, value, 1);
}
pub fn signed_2(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_signed(out, value, 2);
}
pub fn signed_4(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_signed(out, value, 4);
}
pub fn signed_8(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_signed(out, value, 8);
}

pub fn unsigned_1(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 1);
}
pub fn unsigned_2(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 2);
}
pub fn unsigned_4(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 4);
}
pub fn unsigned_8(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 8);
}

pub fn utf_1(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 1);
}
pub fn utf_2(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 2);
}
pub fn utf_4(out: &mut String, _info: &TypeInfo, value: *const u8) {
    write_unsigned(out, value, 4);
}

pub fn float_f32(out: &mut String, _info: &TypeInfo, value: *const u8) {
    let v = unsafe { std::ptr::read_unaligned(value as *const f32) };
    let _ = write!(out, "{}", v);
}
pub fn float_f64(out: &mut String, _info: &TypeInfo, value: *const u8) {
    let v = unsafe { std::ptr::read_unaligned(value as *const f64) };
    let _ = write!(out, "{}", v);
}

/// x86-64's 16-byte `DW_ATE_float`: 80-bit x87 extended precision (an
/// explicit integer bit, unlike IEEE 754's implicit one) packed into the
/// first 10 bytes, with 6 trailing padding bytes. Decoded to the nearest
/// `f64` for display, since Rust has no stable 80-bit float type.
pub fn float_f80(out: &mut String, _info: &TypeInfo, value: *const u8) {
    let mut raw = [0u8; 10];
    unsafe { std::ptr::copy_nonoverlapping(value, raw.as_mut_ptr(), 10) };

    let mantissa = u64::from_le_bytes(raw[0..8].try_into().unwrap());
    let sign_exp = u16::from_le_bytes([raw[8], raw[9]]);
    let sign = sign_exp & 0x8000 != 0;
    let exponent = (sign_exp & 0x7fff) as i32;

    let magnitude = if exponent == 0 && mantissa == 0 {
        0.0
    } else if exponent == 0x7fff {
        if mantissa << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        let unbiased = exponent - 16383;
        (mantissa as f64) * 2f64.powi(unbiased - 63)
    };
    let v = if sign { -magnitude } else { magnitude };
    let _ = write!(out, "{}", v);
}

/// Look up the base-type printer for a `(DW_ATE_*, byte size)` pair, or
/// `None` for a combination this crate does not render (anything unlisted
/// in spec.md §4.6's table).
pub fn base_printer_for(enc: u64, byte_size: u64) -> Option<crate::typeinfo::StringifyFn> {
    match (enc, byte_size) {
        (encoding::FLOAT, 4) => Some(float_f32),
        (encoding::FLOAT, 8) => Some(float_f64),
        (encoding::FLOAT, 16) => Some(float_f80),
        (encoding::SIGNED, 1) | (encoding::SIGNED_CHAR, 1) => Some(signed_1),
        (encoding::SIGNED, 2) => Some(signed_2),
        (encoding::SIGNED, 4) => Some(signed_4),
        (encoding::SIGNED, 8) => Some(signed_8),
        (encoding::UNSIGNED, 1) | (encoding::UNSIGNED_CHAR, 1) => Some(unsigned_1),
        (encoding::UNSIGNED, 2) => Some(unsigned_2),
        (encoding::UNSIGNED, 4) => Some(unsigned_4),
        (encoding::UNSIGNED, 8) => Some(unsigned_8),
        (encoding::UTF, 1) => Some(utf_1),
        (encoding::UTF, 2) => Some(utf_2),
        (encoding::UTF, 4) => Some(utf_4),
        _ => None,
    }
}

/// `i64::MIN`, written out literally since `-9223372036854775808` has no
/// direct signed-64 literal spelling in C-family syntax.
const I64_MIN_SPELLING: &str = "-9223372036854775807-1";

pub fn enum_fn(out: &mut String, info: &TypeInfo, value: *const u8) {
    let e = match info {
        TypeInfo::Enum(e) => e,
        _ => return,
    };
    match e.signedness {
        Signedness::Signed => {
            let signed = unsafe { read_signed(value, e.byte_size) };
            let key = signed as u64;
            if let Some(name) = e.enumerators.get(&key) {
                let _ = write!(out, "{}::{}", e.name, name);
            } else if signed == i64::MIN {
                let _ = write!(out, "static_cast<{}>({})", e.name, I64_MIN_SPELLING);
            } else {
                let _ = write!(out, "static_cast<{}>({})", e.name, signed);
            }
        }
        Signedness::Unsigned => {
            let raw = unsafe { read_bytes(value, e.byte_size) };
            if let Some(name) = e.enumerators.get(&raw) {
                let _ = write!(out, "{}::{}", e.name, name);
            } else if raw > i64::MAX as u64 {
                let _ = write!(out, "static_cast<{}>({}ull)", e.name, raw);
            } else {
                let _ = write!(out, "static_cast<{}>({})", e.name, raw);
            }
        }
    }
}

pub fn struct_fn(out: &mut String, info: &TypeInfo, value: *const u8) {
    let s = match info {
        TypeInfo::Struct(s) => s,
        _ => return,
    };
    out.push('{');
    for (i, member) in s.members.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, ".{}=", member.name);
        let member_ptr = unsafe { value.add(member.offset as usize) };
        (member.printer.function)(out, &member.printer.info, member_ptr);
    }
    out.push('}');
}

pub fn pointer_fn(out: &mut String, _info: &TypeInfo, value: *const u8) {
    let addr = unsafe { read_bytes(value, 8) };
    if addr == 0 {
        out.push_str("nullptr");
    } else {
        let _ = write!(out, "0x{:016x}", addr);
    }
}

pub fn fallback_fn(out: &mut String, _info: &TypeInfo, _value: *const u8) {
    out.push_str("???");
}
