//! The per-instantiation metadata slot: a `(function pointer, type-info
//! pointer)` pair living in a function-local `static`, written exactly
//! once either by the runtime patcher or by the bootstrap path itself.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crate::format;
use crate::patch;
use crate::typeinfo::{StringifyFn, TypeInfo};

/// A slot's two words, each an independent atomic so a racing reader never
/// observes a function pointer paired with the wrong type-info pointer:
/// `install` always writes `type_info` before `function` (Release), and
/// `invoke` always reads `function` before `type_info` (Acquire), so a
/// reader that sees the new function pointer is guaranteed to also see the
/// new type-info pointer.
pub struct MetadataSlot {
    function: AtomicPtr<()>,
    type_info: AtomicPtr<TypeInfo>,
}

impl MetadataSlot {
    pub const fn new() -> MetadataSlot {
        MetadataSlot {
            function: AtomicPtr::new(std::ptr::null_mut()),
            type_info: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Called on every `repr` invocation through this slot. A null function
    /// pointer means "not yet patched": the first caller anywhere in the
    /// process to observe this triggers the one-shot patch pass, then
    /// re-checks. If this particular slot is still unpatched afterward (its
    /// `librepr_T__`/`librepr_stringify_fnti__` DIE pair was never found),
    /// it installs the `???` fallback into itself so later calls skip
    /// straight to a plain pair of atomic loads.
    pub fn invoke(&self, out: &mut String, value: *const u8) {
        let mut function = self.function.load(Ordering::Acquire);
        if function.is_null() {
            patch::ensure_patched();
            function = self.function.load(Ordering::Acquire);
        }
        if function.is_null() {
            self.install(format::fallback_fn, Arc::new(TypeInfo::Fallback));
            function = self.function.load(Ordering::Acquire);
        }

        let type_info = self.type_info.load(Ordering::Acquire);
        // Safety: `function` was stored by `install` as exactly this
        // `StringifyFn`'s address, and `type_info` was stored as exactly
        // the `Arc<TypeInfo>` the same `install` call leaked. They are
        // never written independently of one another.
        let f: StringifyFn = unsafe { std::mem::transmute(function) };
        let info: &TypeInfo = unsafe { &*type_info };
        f(out, info, value);
    }

    /// Install a printer into this slot. Used both by the patcher (writing
    /// into a slot discovered at `bias + Location`) and by a slot patching
    /// itself with the fallback printer.
    pub(crate) fn install(&self, function: StringifyFn, info: Arc<TypeInfo>) {
        let info_ptr = Arc::into_raw(info) as *mut TypeInfo;
        self.type_info.store(info_ptr, Ordering::Release);
        self.function.store(function as *mut (), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_invoke_runs_the_installed_printer() {
        fn shout(out: &mut String, _info: &TypeInfo, _value: *const u8) {
            out.push_str("installed");
        }

        let slot = MetadataSlot::new();
        slot.install(shout, Arc::new(TypeInfo::Fallback));

        let mut out = String::new();
        slot.invoke(&mut out, std::ptr::null());
        assert_eq!(out, "installed");
    }
}
