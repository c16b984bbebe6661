//! Guest frontends — instruction decoding and IR generation.
//!
//! `translate` lowers one guest basic block at a location descriptor
//! into an IR [`Block`](dbt_ir::Block), dispatching on the descriptor's
//! ISA mode. Decoding is table-driven (see [`decoder`]); the per-ISA
//! translator visitors live in [`a32`], [`thumb`] and [`a64`].

pub mod a32;
pub mod a64;
pub mod decoder;
pub mod thumb;

use dbt_ir::{Block, IrEmitter, LocationDescriptor};

/// Callbacks the translator needs from the embedder.
pub trait TranslateCallbacks {
    /// Fetch a 4-byte-aligned little-endian instruction word.
    fn memory_read_code(&mut self, vaddr: u64) -> u32;

    /// Instrumentation point fired before each instruction is decoded.
    fn pre_translate_hook(&mut self, _is_thumb: bool, _pc: u64, _ir: &mut IrEmitter) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationOptions {
    /// Stop after a single instruction and terminate with `LinkBlock`
    /// so the dispatcher regains control between instructions.
    pub single_step: bool,
}

/// Translate one basic block starting at `descriptor`.
///
/// The returned block always has a terminal, and its cycle count equals
/// the number of guest instructions lowered into it.
pub fn translate(
    descriptor: LocationDescriptor,
    cb: &mut dyn TranslateCallbacks,
    options: TranslationOptions,
) -> Block {
    use dbt_ir::location::IsaMode;
    let block = match descriptor.isa_mode() {
        IsaMode::A32 => a32::translate_arm(descriptor, cb, options),
        IsaMode::Thumb => thumb::translate_thumb(descriptor, cb, options),
        IsaMode::A64 => a64::translate_a64(descriptor, cb, options),
    };
    debug_assert!(block.has_terminal(), "translator produced no terminal");
    tracing::trace!(
        location = ?descriptor,
        insts = block.len(),
        cycles = block.cycle_count(),
        "translated block"
    );
    block
}
