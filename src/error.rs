//! Error types shared by every stage of DWARF/ELF processing.

use std::result;

/// The result of a parsing or loading operation.
pub type Result<T> = result::Result<T, Error>;

/// Everything that can go wrong while locating, parsing, or interpreting
/// the debug information of the host process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening, `fstat`-ing, reading, or `mmap`-ing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the ELF magic number.
    #[error("not an ELF file")]
    NotElf,

    /// The file is ELF, but not the 64-bit little-endian x86-64
    /// executable or shared object this crate supports.
    #[error("unsupported ELF variant: {0}")]
    UnsupportedElf(&'static str),

    /// None of `.debug_info`/`.debug_abbrev`/`.debug_str` were found,
    /// even after following `.gnu_debuglink`.
    #[error("no debug info found")]
    NoDebugInfo,

    /// The unit length field used the DWARF64 escape value `0xffffffff`.
    #[error("64-bit DWARF format is not supported")]
    Unsupported64BitDwarf,

    /// The compilation unit header declared a version other than 4 or 5.
    #[error("unsupported DWARF version: {0}")]
    UnsupportedDwarfVersion(u16),

    /// A structural invariant of the DWARF data was violated (abbrev code
    /// ordering, a truncated read, an unexpected child tag, ...).
    #[error("malformed DWARF data: {0}")]
    Malformed(&'static str),

    /// A DIE attribute used a `DW_FORM_*` code this crate does not decode.
    #[error("unknown DW_FORM_* code: {0}")]
    UnknownForm(u64),
}
