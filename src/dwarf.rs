//! DWARF tag, attribute, and form constants.
//!
//! Layout mirrors gimli's `types.rs`: plain C-like enums over the numeric
//! codes the standard assigns, extended with the DWARF 5 forms this crate
//! needs to decode (`Strx*`, `Addrx*`, `Data16`, `ImplicitConst`, ...).

/// `DW_TAG_*`: what kind of entity a DIE describes.
///
/// DWARF standard 5, section 7.5.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Tag {
    ArrayType = 0x01,
    ClassType = 0x02,
    EntryPoint = 0x03,
    EnumerationType = 0x04,
    FormalParameter = 0x05,
    ImportedDeclaration = 0x08,
    Label = 0x0a,
    LexicalBlock = 0x0b,
    Member = 0x0d,
    PointerType = 0x0f,
    ReferenceType = 0x10,
    CompileUnit = 0x11,
    StringType = 0x12,
    StructureType = 0x13,
    SubroutineType = 0x15,
    Typedef = 0x16,
    UnionType = 0x17,
    UnspecifiedParameters = 0x18,
    Variant = 0x19,
    CommonBlock = 0x1a,
    CommonInclusion = 0x1b,
    Inheritance = 0x1c,
    InlinedSubroutine = 0x1d,
    Module = 0x1e,
    PtrToMemberType = 0x1f,
    SetType = 0x20,
    SubrangeType = 0x21,
    WithStmt = 0x22,
    AccessDeclaration = 0x23,
    BaseType = 0x24,
    CatchBlock = 0x25,
    ConstType = 0x26,
    Constant = 0x27,
    Enumerator = 0x28,
    FileType = 0x29,
    Friend = 0x2a,
    Namelist = 0x2b,
    NamelistItem = 0x2c,
    PackedType = 0x2d,
    Subprogram = 0x2e,
    TemplateTypeParameter = 0x2f,
    TemplateValueParameter = 0x30,
    ThrownType = 0x31,
    TryBlock = 0x32,
    VariantPart = 0x33,
    Variable = 0x34,
    VolatileType = 0x35,
    DwarfProcedure = 0x36,
    RestrictType = 0x37,
    InterfaceType = 0x38,
    Namespace = 0x39,
    ImportedModule = 0x3a,
    UnspecifiedType = 0x3b,
    PartialUnit = 0x3c,
    ImportedUnit = 0x3d,
    Condition = 0x3f,
    SharedType = 0x40,
    TypeUnit = 0x41,
    RvalueReferenceType = 0x42,
    TemplateAlias = 0x43,
    /// Anything else; the numeric code is kept for diagnostics.
    Unknown(u64),
}

impl Tag {
    /// Decode a `DW_TAG_*` code.
    pub fn from_u64(value: u64) -> Tag {
        match value {
            0x01 => Tag::ArrayType,
            0x02 => Tag::ClassType,
            0x03 => Tag::EntryPoint,
            0x04 => Tag::EnumerationType,
            0x05 => Tag::FormalParameter,
            0x08 => Tag::ImportedDeclaration,
            0x0a => Tag::Label,
            0x0b => Tag::LexicalBlock,
            0x0d => Tag::Member,
            0x0f => Tag::PointerType,
            0x10 => Tag::ReferenceType,
            0x11 => Tag::CompileUnit,
            0x12 => Tag::StringType,
            0x13 => Tag::StructureType,
            0x15 => Tag::SubroutineType,
            0x16 => Tag::Typedef,
            0x17 => Tag::UnionType,
            0x18 => Tag::UnspecifiedParameters,
            0x19 => Tag::Variant,
            0x1a => Tag::CommonBlock,
            0x1b => Tag::CommonInclusion,
            0x1c => Tag::Inheritance,
            0x1d => Tag::InlinedSubroutine,
            0x1e => Tag::Module,
            0x1f => Tag::PtrToMemberType,
            0x20 => Tag::SetType,
            0x21 => Tag::SubrangeType,
            0x22 => Tag::WithStmt,
            0x23 => Tag::AccessDeclaration,
            0x24 => Tag::BaseType,
            0x25 => Tag::CatchBlock,
            0x26 => Tag::ConstType,
            0x27 => Tag::Constant,
            0x28 => Tag::Enumerator,
            0x29 => Tag::FileType,
            0x2a => Tag::Friend,
            0x2b => Tag::Namelist,
            0x2c => Tag::NamelistItem,
            0x2d => Tag::PackedType,
            0x2e => Tag::Subprogram,
            0x2f => Tag::TemplateTypeParameter,
            0x30 => Tag::TemplateValueParameter,
            0x31 => Tag::ThrownType,
            0x32 => Tag::TryBlock,
            0x33 => Tag::VariantPart,
            0x34 => Tag::Variable,
            0x35 => Tag::VolatileType,
            0x36 => Tag::DwarfProcedure,
            0x37 => Tag::RestrictType,
            0x38 => Tag::InterfaceType,
            0x39 => Tag::Namespace,
            0x3a => Tag::ImportedModule,
            0x3b => Tag::UnspecifiedType,
            0x3c => Tag::PartialUnit,
            0x3d => Tag::ImportedUnit,
            0x3f => Tag::Condition,
            0x40 => Tag::SharedType,
            0x41 => Tag::TypeUnit,
            0x42 => Tag::RvalueReferenceType,
            0x43 => Tag::TemplateAlias,
            other => Tag::Unknown(other),
        }
    }
}

/// `DW_AT_*`: the name half of an attribute specification.
///
/// DWARF standard 5, section 7.5.4. Only the attributes this crate ever
/// inspects get a named variant; everything else decodes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum AttributeName {
    Location = 0x02,
    Name = 0x03,
    ByteSize = 0x0b,
    Encoding = 0x3e,
    DataMemberLocation = 0x38,
    ConstValue = 0x1c,
    Type = 0x49,
    Unknown(u64),
}

impl AttributeName {
    /// Decode a `DW_AT_*` code.
    pub fn from_u64(value: u64) -> AttributeName {
        match value {
            0x02 => AttributeName::Location,
            0x03 => AttributeName::Name,
            0x0b => AttributeName::ByteSize,
            0x3e => AttributeName::Encoding,
            0x38 => AttributeName::DataMemberLocation,
            0x1c => AttributeName::ConstValue,
            0x49 => AttributeName::Type,
            other => AttributeName::Unknown(other),
        }
    }
}

/// `DW_FORM_*`: the on-disk encoding of an attribute's value.
///
/// DWARF standard 5, section 7.5.6. Only the forms spec.md's "Supported
/// form widths" table lists get a variant; every other `DW_FORM_*` code,
/// known to the standard or not, decodes to `None` via [`from_u64`] so the
/// abbrev parser rejects it with `UnknownForm(n)`.
///
/// [`from_u64`]: AttributeForm::from_u64
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum AttributeForm {
    Addr = 0x01,
    Data2 = 0x05,
    Data4 = 0x06,
    Data8 = 0x07,
    String = 0x08,
    Block = 0x09,
    Block1 = 0x0a,
    Data1 = 0x0b,
    Flag = 0x0c,
    Sdata = 0x0d,
    Strp = 0x0e,
    Udata = 0x0f,
    Ref4 = 0x13,
    Ref8 = 0x14,
    RefUdata = 0x15,
    SecOffset = 0x17,
    Exprloc = 0x18,
    FlagPresent = 0x19,
    Addrx = 0x1b,
    Data16 = 0x1e,
    LineStrp = 0x1f,
    ImplicitConst = 0x21,
    Loclistx = 0x22,
    Rnglistx = 0x23,
    Strx1 = 0x25,
    Strx2 = 0x26,
    Addrx1 = 0x29,
}

impl AttributeForm {
    /// Decode a `DW_FORM_*` code, or `None` if it is not in spec.md's
    /// supported-form table (whether or not the DWARF standard itself
    /// knows it).
    pub fn from_u64(value: u64) -> Option<AttributeForm> {
        Some(match value {
            0x01 => AttributeForm::Addr,
            0x05 => AttributeForm::Data2,
            0x06 => AttributeForm::Data4,
            0x07 => AttributeForm::Data8,
            0x08 => AttributeForm::String,
            0x09 => AttributeForm::Block,
            0x0a => AttributeForm::Block1,
            0x0b => AttributeForm::Data1,
            0x0c => AttributeForm::Flag,
            0x0d => AttributeForm::Sdata,
            0x0e => AttributeForm::Strp,
            0x0f => AttributeForm::Udata,
            0x13 => AttributeForm::Ref4,
            0x14 => AttributeForm::Ref8,
            0x15 => AttributeForm::RefUdata,
            0x17 => AttributeForm::SecOffset,
            0x18 => AttributeForm::Exprloc,
            0x19 => AttributeForm::FlagPresent,
            0x1b => AttributeForm::Addrx,
            0x1e => AttributeForm::Data16,
            0x1f => AttributeForm::LineStrp,
            0x21 => AttributeForm::ImplicitConst,
            0x22 => AttributeForm::Loclistx,
            0x23 => AttributeForm::Rnglistx,
            0x25 => AttributeForm::Strx1,
            0x26 => AttributeForm::Strx2,
            0x29 => AttributeForm::Addrx1,
            _ => return None,
        })
    }

    /// The on-disk width of a value in this form, where it is fixed or
    /// computable without reading the value itself. `None` means the width
    /// has to be discovered while decoding (LEB128 scan, length-prefixed).
    pub fn fixed_width(self) -> Option<usize> {
        use AttributeForm::*;
        match self {
            FlagPresent | ImplicitConst => Some(0),
            Data1 | Strx1 | Addrx1 | Flag => Some(1),
            Data2 | Strx2 => Some(2),
            Data4 | Ref4 | Strp | LineStrp | SecOffset => Some(4),
            Data8 | Addr | Ref8 => Some(8),
            Data16 => Some(16),
            _ => None,
        }
    }
}

/// Normalized integer signedness derived from a `DW_AT_encoding` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// `DW_ATE_*` encodings this crate distinguishes.
pub mod encoding {
    pub const ADDRESS: u64 = 0x1;
    pub const BOOLEAN: u64 = 0x2;
    pub const FLOAT: u64 = 0x4;
    pub const SIGNED: u64 = 0x5;
    pub const SIGNED_CHAR: u64 = 0x6;
    pub const UNSIGNED: u64 = 0x7;
    pub const UNSIGNED_CHAR: u64 = 0x8;
    pub const UTF: u64 = 0x10;
}

/// Normalize a `DW_ATE_*` value to signed/unsigned, per spec.md §4.6:
/// {5,6} are signed, {7,8,16} are unsigned (UTF is treated as unsigned for
/// the purpose of choosing an underlying integer printer).
pub fn normalize_encoding(enc: u64) -> Option<Signedness> {
    use encoding::*;
    match enc {
        SIGNED | SIGNED_CHAR => Some(Signedness::Signed),
        UNSIGNED | UNSIGNED_CHAR | UTF => Some(Signedness::Unsigned),
        _ => None,
    }
}
