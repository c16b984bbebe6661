//! x86-64 backend: JIT state, register allocation, code emission and
//! the block cache with its chaining/patching machinery.
//!
//! Layering, leaves first: [`hostloc`] and [`jitstate`] define the data
//! model shared with emitted code; [`encoder`] is the raw x86-64
//! instruction encoder; [`block_of_code`] owns the executable buffer
//! (near/far regions, constant pool, dispatcher prologue);
//! [`reg_alloc`] binds SSA values to host locations; [`emit`] lowers IR
//! opcodes and terminals and maintains the code cache.

pub mod abi;
pub mod block_of_code;
pub mod block_ranges;
pub mod emit;
pub mod encoder;
pub mod hostloc;
pub mod jitstate;
pub mod reg_alloc;

pub use block_of_code::{BlockOfCode, HostFeature};
pub use emit::{BlockDescriptor, EmitError, EmitX64, Thunks};
pub use jitstate::JitState;

/// Pointer to emitted host code.
pub type CodePtr = *const u8;
