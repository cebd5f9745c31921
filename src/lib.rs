//! `repr(&value)`: a runtime pretty-printer for the host program's own
//! types, built by reading the program's own DWARF debug info instead of
//! requiring the caller to register a printer for every type.
//!
//! Call [`repr`] on any value whose type the compiler can still see debug
//! info for; the first call in the process walks `/proc/self/exe`'s debug
//! info once (see [`patch`]) and every call after that is a pair of atomic
//! loads and a function call.

#![allow(non_camel_case_types)]

mod abbrev;
mod builder;
mod die;
mod dwarf;
mod elf;
pub mod error;
mod format;
mod loader;
mod patch;
mod reader;
mod slot;
mod typeinfo;
mod unit;

use slot::MetadataSlot;

/// Render `val` the way its own compiler debug info describes it, e.g.
/// `MyEnum::Alpha` or `{.x=3, .y=4}`. Falls back to `"???"` for types the
/// debug-info engine can't resolve, or when no debug info is available at
/// all; never panics and never propagates an error to the caller.
///
/// The type parameter's literal name matters: the crate relies on the
/// compiler emitting a `DW_TAG_template_type_parameter` DIE named exactly
/// `librepr_T__` for every monomorphization, paired with this function's
/// `librepr_stringify_fnti__` metadata slot. Do not rename either.
pub fn repr<librepr_T__>(val: &librepr_T__) -> String {
    #[allow(non_upper_case_globals)]
    static librepr_stringify_fnti__: MetadataSlot = MetadataSlot::new();

    let mut out = String::new();
    librepr_stringify_fnti__.invoke(&mut out, val as *const librepr_T__ as *const u8);
    out
}
