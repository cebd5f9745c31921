//! The one-shot runtime patcher: computes the process's load bias from a
//! sentinel symbol, then walks every compilation unit pairing up
//! `librepr_T__`/`librepr_stringify_fnti__` DIEs and writing the printer
//! for each pairing into its live metadata slot.

use std::sync::Once;

use crate::builder;
use crate::die::DieCursor;
use crate::dwarf::{AttributeName, Tag};
use crate::error::Result;
use crate::loader::{self, DebugData};
use crate::slot::MetadataSlot;
use crate::unit::CompilationUnit;

const TEMPLATE_PARAM_NAME: &str = "librepr_T__";
const METADATA_VARIABLE_NAME: &str = "librepr_stringify_fnti__";
const GLOBAL_OFFSET_MARKER_NAME: &str = "librepr_global_offset_marker__";

/// The sentinel whose DWARF-reported address, compared against its actual
/// runtime address, gives the process's load bias. Exists purely to be
/// found; its value is never read.
#[no_mangle]
#[used]
static librepr_global_offset_marker__: u8 = 0;

static PATCH_ONCE: Once = Once::new();

/// Run the patch pass if it hasn't run yet in this process. Safe to call
/// from any number of racing threads; only the first actually does work.
pub fn ensure_patched() {
    PATCH_ONCE.call_once(|| {
        if let Err(e) = run() {
            log::warn!(
                "librepr: could not patch metadata slots, repr() will fall back to ???: {}",
                e
            );
        }
    });
}

fn run() -> Result<()> {
    let data = loader::get_or_load()?;
    let bias = compute_load_bias(data)?;
    for (cu_idx, cu) in data.units.iter().enumerate() {
        if let Err(e) = patch_unit(data, cu_idx, cu, bias) {
            log::warn!("librepr: error walking compilation unit {}: {}", cu_idx, e);
        }
    }
    Ok(())
}

fn walk_cu<'a>(
    cursor: &DieCursor<'a>,
    cu: &CompilationUnit,
    mut visit: impl FnMut(&crate::die::Die<'a>) -> Result<()>,
) -> Result<()> {
    let mut die = cursor.load(cu, cu.root_die_offset)?;
    loop {
        visit(&die)?;
        match cursor.next(cu, &die)? {
            Some(next) => die = next,
            None => return Ok(()),
        }
    }
}

/// Scan every CU for the `librepr_global_offset_marker__` variable and
/// derive the load bias from the gap between its DWARF-recorded address
/// and its actual address in this process.
fn compute_load_bias(data: &DebugData) -> Result<i64> {
    let cursor = DieCursor::new(data.debug_info());
    let actual = &librepr_global_offset_marker__ as *const u8 as i64;

    for cu in &data.units {
        let mut found = None;
        walk_cu(&cursor, cu, |die| {
            if found.is_none()
                && die.tag == Tag::Variable
                && die.get_cstring(AttributeName::Name, data.debug_str())
                    == Some(GLOBAL_OFFSET_MARKER_NAME)
            {
                found = die.get_offset(AttributeName::Location);
            }
            Ok(())
        })?;
        if let Some(dwarf_addr) = found {
            return Ok(actual - dwarf_addr as i64);
        }
    }

    Err(crate::error::Error::NoDebugInfo)
}

/// Pair up `librepr_T__` template-parameter DIEs with the adjacent
/// `librepr_stringify_fnti__` variable DIE within the same function, per
/// the pairing rule: both pending references reset whenever a `Subprogram`
/// is entered, and are consumed (then cleared) as soon as both are set.
fn patch_unit(data: &'static DebugData, cu_idx: usize, cu: &CompilationUnit, bias: i64) -> Result<()> {
    let cursor = DieCursor::new(data.debug_info());
    let mut pending_type_offset: Option<usize> = None;
    let mut pending_location: Option<u64> = None;

    walk_cu(&cursor, cu, |die| {
        match die.tag {
            Tag::Subprogram => {
                pending_type_offset = None;
                pending_location = None;
            }
            Tag::TemplateTypeParameter => {
                if die.get_cstring(AttributeName::Name, data.debug_str()) == Some(TEMPLATE_PARAM_NAME) {
                    pending_type_offset = builder::resolve_ref(cu, die, AttributeName::Type);
                }
            }
            Tag::Variable => {
                if die.get_cstring(AttributeName::Name, data.debug_str()) == Some(METADATA_VARIABLE_NAME) {
                    pending_location = die.get_offset(AttributeName::Location);
                }
            }
            _ => {}
        }

        if let (Some(type_offset), Some(location)) = (pending_type_offset, pending_location) {
            match builder::load_printer(data, cu_idx, type_offset) {
                Ok(printer) => {
                    let slot_addr = (bias + location as i64) as usize;
                    // Safety: `location` is the DWARF-reported address of a
                    // `librepr_stringify_fnti__` static, which is declared
                    // as a `MetadataSlot`; `bias` corrects it to this
                    // process's actual address space.
                    unsafe {
                        let slot = &*(slot_addr as *const MetadataSlot);
                        slot.install(printer.function, printer.info);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "librepr: failed to build a printer for type at offset {}: {}",
                        type_offset,
                        e
                    );
                }
            }
            pending_type_offset = None;
            pending_location = None;
        }

        Ok(())
    })
}
