//! The printer data model: a tagged `(function pointer, opaque type info)`
//! pair, in place of a trait-object hierarchy, per spec.md §3/§9's "tagged
//! printer dispatch replaces polymorphic class hierarchies" note.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dwarf::Signedness;

/// A printer's rendering function: append `value`'s text to `out`, reading
/// `value` according to whatever `info` says its shape is.
pub type StringifyFn = fn(out: &mut String, info: &TypeInfo, value: *const u8);

/// A printer is this pair, copyable, with no vtable indirection: the
/// function pointer alone determines how to interpret `info` (and, for
/// `TypeInfo::Base`, determines the width/signedness/encoding on its own,
/// since the base-type variant carries no payload).
#[derive(Clone)]
pub struct Printer {
    pub function: StringifyFn,
    pub info: Arc<TypeInfo>,
}

/// An `enum class`'s reflected shape: its name and its enumerator map.
///
/// Enumerator values are canonicalized to a `u64` bit pattern: for a
/// signed underlying type the mathematical value is bit-cast from `i64`;
/// for unsigned it is used directly. Two's-complement bit-casting between
/// `i64` and `u64` is bijective, so a single map serves both signedness
/// cases as long as building and rendering canonicalize the same way (see
/// `format::enum_fn`).
pub struct EnumInfo {
    pub name: String,
    pub signedness: Signedness,
    pub byte_size: u8,
    pub enumerators: HashMap<u64, String>,
}

/// One flattened member of a struct or class, including inherited members
/// (whose offset already has the base class's `DataMemberLocation` added
/// in).
pub struct StructMember {
    pub name: String,
    pub offset: u64,
    pub printer: Printer,
}

pub struct StructInfo {
    pub members: Vec<StructMember>,
}

/// What a printer's opaque side-table holds. `Base` and `Pointer` carry no
/// data at all — for those the function pointer alone encodes everything,
/// matching spec.md §3's data model exactly.
pub enum TypeInfo {
    Enum(EnumInfo),
    Struct(StructInfo),
    Base,
    Pointer,
    /// The type-plan builder could not make sense of this DIE; render `???`.
    Fallback,
}
