//! IR core — the typed SSA intermediate representation shared by the
//! frontend translators and the x86-64 backend.
//!
//! A translated guest basic block becomes a [`Block`]: an arena of
//! [`Inst`]s in program order plus exactly one [`Terminal`]. Values are
//! either immediates or references to earlier instructions; every
//! instruction carries an exact use count that the register allocator
//! relies on.

pub mod block;
pub mod dump;
pub mod ir_emitter;
pub mod location;
pub mod opcode;
pub mod opt;
pub mod types;
pub mod value;

pub use block::{Block, Inst, InstIndex, Terminal};
pub use ir_emitter::{IrEmitter, ResultAndCarry};
pub use location::LocationDescriptor;
pub use opcode::Opcode;
pub use types::{
    A32ExtReg, A32Reg, A64Reg, A64Vec, Cond, Exception, Type,
};
pub use value::Value;

/// Maximum number of arguments any opcode takes.
pub const MAX_ARGS: usize = 4;
