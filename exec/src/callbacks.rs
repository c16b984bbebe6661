//! The embedder-facing callback surface and the `extern "C"` thunks
//! through which emitted code reaches it.

use dbt_ir::{Exception, IrEmitter};

/// Services the translator and emitted code require from the embedder.
///
/// Memory reads may be unaligned; byte-swapping for big-endian guest
/// data is handled by the JIT. `is_read_only_memory` may always return
/// `false`; returning `true` lets the optimizer fold loads from that
/// address at translation time.
pub trait Callbacks {
    /// Fetch a 4-byte-aligned little-endian instruction word.
    fn memory_read_code(&mut self, vaddr: u64) -> u32;

    fn read8(&mut self, vaddr: u64) -> u8;
    fn read16(&mut self, vaddr: u64) -> u16;
    fn read32(&mut self, vaddr: u64) -> u32;
    fn read64(&mut self, vaddr: u64) -> u64;
    fn write8(&mut self, vaddr: u64, value: u8);
    fn write16(&mut self, vaddr: u64, value: u16);
    fn write32(&mut self, vaddr: u64, value: u32);
    fn write64(&mut self, vaddr: u64, value: u64);

    fn is_read_only_memory(&mut self, _vaddr: u64) -> bool {
        false
    }

    /// Supervisor-call trap.
    fn call_svc(&mut self, swi: u32);

    /// Guest-visible fault (undefined instruction, breakpoint, ...).
    /// The faulting PC has already been stored to the guest state.
    fn exception_raised(&mut self, _pc: u64, _exception: Exception) {}

    /// Execute exactly one guest instruction through a reference
    /// interpreter (the `Interpret` terminal).
    fn interpreter_fallback(&mut self, _pc: u64) {
        unimplemented!("no interpreter fallback provided");
    }

    /// Cycle accounting (used when tick callbacks are enabled).
    fn add_ticks(&mut self, _ticks: u64) {}

    fn get_ticks_remaining(&mut self) -> u64 {
        0
    }

    /// Instrumentation point fired before each instruction is decoded.
    fn pre_translate_hook(&mut self, _is_thumb: bool, _pc: u64, _ir: &mut IrEmitter) {}
}

/// Adapts `Callbacks` to the frontend's translate-time interface.
pub(crate) struct TranslateBridge<'a> {
    pub cb: &'a mut dyn Callbacks,
}

impl dbt_frontend::TranslateCallbacks for TranslateBridge<'_> {
    fn memory_read_code(&mut self, vaddr: u64) -> u32 {
        self.cb.memory_read_code(vaddr)
    }

    fn pre_translate_hook(&mut self, is_thumb: bool, pc: u64, ir: &mut IrEmitter) {
        self.cb.pre_translate_hook(is_thumb, pc, ir);
    }
}

/// Adapts `Callbacks` to the constant-propagation pass's read-only
/// memory capability.
pub(crate) struct RomBridge<'a> {
    pub cb: std::cell::RefCell<&'a mut dyn Callbacks>,
}

impl dbt_ir::opt::ReadOnlyMemory for RomBridge<'_> {
    fn read_const(&self, vaddr: u64, size_bytes: usize) -> Option<u64> {
        let mut cb = self.cb.borrow_mut();
        if !cb.is_read_only_memory(vaddr) {
            return None;
        }
        Some(match size_bytes {
            1 => u64::from(cb.read8(vaddr)),
            2 => u64::from(cb.read16(vaddr)),
            4 => u64::from(cb.read32(vaddr)),
            _ => cb.read64(vaddr),
        })
    }
}
