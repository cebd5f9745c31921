//! The process-wide singleton owning the mapped ELF file and its parsed
//! compilation units.

use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::elf::{self, LoadedElf};
use crate::error::Result;
use crate::unit::{self, CompilationUnit};

/// The host process's own debug info: the leaked mmap backing it, and
/// every compilation unit parsed out of `.debug_info`.
///
/// The mapping is intentionally never unmapped (per spec.md §5, "the
/// mapping itself is intentionally leaked"): it is leaked once via
/// `Box::leak` so every borrow handed out from it can be `'static`,
/// matching the process-lifetime singleton this type is stored behind.
pub struct DebugData {
    elf: &'static LoadedElf,
    pub units: Vec<CompilationUnit>,
}

impl DebugData {
    pub fn debug_info(&self) -> &'static [u8] {
        self.elf.debug_info()
    }

    pub fn debug_str(&self) -> &'static [u8] {
        self.elf.debug_str()
    }
}

fn load_from(path: &Path) -> Result<DebugData> {
    let elf: &'static LoadedElf = Box::leak(Box::new(elf::load(path)?));
    let units = unit::parse_units(elf.debug_info(), elf.debug_abbrev())?;
    Ok(DebugData { elf, units })
}

#[cfg(test)]
impl DebugData {
    /// Build a `DebugData` straight from hand-assembled section bytes,
    /// bypassing the ELF loader entirely, for exercising later stages in
    /// isolation.
    pub fn for_test(debug_info: Vec<u8>, debug_str: Vec<u8>, units: Vec<CompilationUnit>) -> DebugData {
        use crate::elf::SectionRange;

        let info_len = debug_info.len();
        let str_len = debug_str.len();
        let mut bytes = debug_info;
        let info_range = SectionRange { offset: 0, len: info_len };
        let str_offset = bytes.len();
        bytes.extend_from_slice(&debug_str);
        let str_range = SectionRange { offset: str_offset, len: str_len };

        let elf: &'static LoadedElf = Box::leak(Box::new(LoadedElf::from_owned_bytes(
            bytes,
            info_range,
            SectionRange { offset: 0, len: 0 },
            str_range,
        )));
        DebugData { elf, units }
    }
}

static LOADER: OnceCell<Mutex<Option<&'static DebugData>>> = OnceCell::new();

/// Load (on first call) or return the already-loaded process-wide debug
/// data for `/proc/self/exe`. Failures are not cached: a transient failure
/// (e.g. a momentarily unreadable file) does not permanently wedge the
/// facility into `???`, though in practice `/proc/self/exe` either has
/// debug info or it never will for the life of the process.
pub fn get_or_load() -> Result<&'static DebugData> {
    let cell = LOADER.get_or_init(|| Mutex::new(None));
    let mut guard = cell.lock().unwrap();
    if let Some(data) = *guard {
        return Ok(data);
    }
    let data: &'static DebugData = Box::leak(Box::new(load_from(Path::new("/proc/self/exe"))?));
    *guard = Some(data);
    Ok(data)
}
