//! Dispatcher, cache-invalidation policy and the public `Jit` facade.
//!
//! The embedder supplies a [`Callbacks`] implementation and initial
//! register state, then drives the guest forward with
//! [`Jit::run`]. Block lookup re-enters the translate → optimize →
//! emit pipeline on a cache miss; invalidation requested while
//! emulated code is on the stack is deferred to the next run-loop
//! boundary.

mod callbacks;
mod jit;

pub use callbacks::Callbacks;
pub use jit::{Config, GuestArch, HaltHandle, InvalidationHandle, Jit};

pub use dbt_ir::{A32Reg, Cond, Exception, LocationDescriptor};
