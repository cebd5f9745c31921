//! Locates the DWARF debug sections of an ELF64 file, mmap'd read-only,
//! following `.gnu_debuglink` to a sibling file when the sections are
//! stripped out of the original.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::reader::Reader;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ET_EXEC: u16 = 2;
const ET_DYN: u16 = 3;
const EM_X86_64: u16 = 62;

const MAX_DEBUGLINK_HOPS: u32 = 4;

/// A section's span within the mapped file.
#[derive(Debug, Clone, Copy)]
pub struct SectionRange {
    pub offset: usize,
    pub len: usize,
}

impl SectionRange {
    fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.len]
    }
}

/// The byte source behind a [`LoadedElf`]: a real mmap in production, or a
/// plain buffer when building section bytes by hand for tests.
enum Backing {
    Mapped(Mmap),
    #[cfg(test)]
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for Backing {
    fn as_ref(&self) -> &[u8] {
        match self {
            Backing::Mapped(m) => m,
            #[cfg(test)]
            Backing::Owned(v) => v,
        }
    }
}

/// The mapping backing a loaded ELF file, plus the three sections this
/// crate reads out of it.
pub struct LoadedElf {
    data: Backing,
    pub debug_info: SectionRange,
    pub debug_abbrev: SectionRange,
    pub debug_str: SectionRange,
}

impl LoadedElf {
    pub fn debug_info(&self) -> &[u8] {
        self.debug_info.slice(self.data.as_ref())
    }

    pub fn debug_abbrev(&self) -> &[u8] {
        self.debug_abbrev.slice(self.data.as_ref())
    }

    pub fn debug_str(&self) -> &[u8] {
        self.debug_str.slice(self.data.as_ref())
    }

    #[cfg(test)]
    pub(crate) fn from_owned_bytes(
        data: Vec<u8>,
        debug_info: SectionRange,
        debug_abbrev: SectionRange,
        debug_str: SectionRange,
    ) -> LoadedElf {
        LoadedElf {
            data: Backing::Owned(data),
            debug_info,
            debug_abbrev,
            debug_str,
        }
    }
}

/// Load and validate the ELF file at `path`, following `.gnu_debuglink` if
/// the three debug sections are not present directly.
pub fn load(path: &Path) -> Result<LoadedElf> {
    load_with_hops(path, 0)
}

fn load_with_hops(path: &Path, hops: u32) -> Result<LoadedElf> {
    if hops > MAX_DEBUGLINK_HOPS {
        return Err(Error::NoDebugInfo);
    }

    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let (debug_info, debug_abbrev, debug_str, debug_link) = locate_sections(&mmap)?;

    if let (Some(debug_info), Some(debug_abbrev), Some(debug_str)) =
        (debug_info, debug_abbrev, debug_str)
    {
        return Ok(LoadedElf {
            data: Backing::Mapped(mmap),
            debug_info,
            debug_abbrev,
            debug_str,
        });
    }

    let debug_link = debug_link.ok_or(Error::NoDebugInfo)?;

    let resolved = if path == Path::new("/proc/self/exe") {
        std::fs::read_link(path)?
    } else {
        path.to_path_buf()
    };

    let sibling = debuglink_sibling(&resolved, &debug_link);
    load_with_hops(&sibling, hops + 1)
}

fn debuglink_sibling(resolved: &Path, debug_link: &str) -> PathBuf {
    let dir = resolved.parent().unwrap_or_else(|| Path::new("/"));
    dir.join(debug_link)
}

/// Walk the section header table, returning the three debug sections (if
/// present) and the `.gnu_debuglink` filename (if present).
fn locate_sections(
    data: &[u8],
) -> Result<(
    Option<SectionRange>,
    Option<SectionRange>,
    Option<SectionRange>,
    Option<String>,
)> {
    if data.len() < 64 || data[0..4] != ELF_MAGIC {
        return Err(Error::NotElf);
    }
    if data[4] != ELFCLASS64 {
        return Err(Error::UnsupportedElf("not a 64-bit ELF file"));
    }
    if data[5] != ELFDATA2LSB {
        return Err(Error::UnsupportedElf("not little-endian"));
    }

    let mut header = Reader::new(&data[16..]);
    let e_type = header.u16()?;
    let e_machine = header.u16()?;
    header.skip(4)?; // e_version
    header.skip(8)?; // e_entry
    header.skip(8)?; // e_phoff
    let e_shoff = header.u64()? as usize;
    header.skip(4)?; // e_flags
    header.skip(2)?; // e_ehsize
    header.skip(2)?; // e_phentsize
    header.skip(2)?; // e_phnum
    let e_shentsize = header.u16()? as usize;
    let e_shnum = header.u16()? as usize;
    let e_shstrndx = header.u16()? as usize;

    if e_type != ET_EXEC && e_type != ET_DYN {
        return Err(Error::UnsupportedElf("not an executable or shared object"));
    }
    if e_machine != EM_X86_64 {
        return Err(Error::UnsupportedElf("not x86-64"));
    }

    let shdr = |index: usize| -> Result<(u32, usize, usize)> {
        let start = e_shoff + index * e_shentsize;
        let mut r = Reader::new(
            data.get(start..start + e_shentsize)
                .ok_or(Error::Malformed("section header table out of range"))?,
        );
        let sh_name = r.u32()?;
        r.skip(4)?; // sh_type
        r.skip(8)?; // sh_flags
        r.skip(8)?; // sh_addr
        let sh_offset = r.u64()? as usize;
        let sh_size = r.u64()? as usize;
        Ok((sh_name, sh_offset, sh_size))
    };

    let (_, shstr_offset, shstr_size) = shdr(e_shstrndx)?;
    let shstrtab = data
        .get(shstr_offset..shstr_offset + shstr_size)
        .ok_or(Error::Malformed("section header string table out of range"))?;

    let mut debug_info = None;
    let mut debug_abbrev = None;
    let mut debug_str = None;
    let mut debug_link = None;

    for i in 0..e_shnum {
        let (sh_name, sh_offset, sh_size) = shdr(i)?;
        let name = section_name(shstrtab, sh_name as usize)?;
        let range = SectionRange {
            offset: sh_offset,
            len: sh_size,
        };
        match name {
            ".debug_info" => debug_info = Some(range),
            ".debug_abbrev" => debug_abbrev = Some(range),
            ".debug_str" => debug_str = Some(range),
            ".gnu_debuglink" => {
                let mut r = Reader::new(
                    data.get(sh_offset..sh_offset + sh_size)
                        .ok_or(Error::Malformed("gnu_debuglink section out of range"))?,
                );
                debug_link = Some(r.cstr()?.to_owned());
            }
            _ => {}
        }
    }

    Ok((debug_info, debug_abbrev, debug_str, debug_link))
}

fn section_name(shstrtab: &[u8], offset: usize) -> Result<&str> {
    let mut r = Reader::new(
        shstrtab
            .get(offset..)
            .ok_or(Error::Malformed("section name offset out of range"))?,
    );
    r.cstr()
}
