//! System V x86-64 calling convention constants.
//!
//! The backend targets the SysV ABI only; the register lists below are
//! consumed by the prologue generator and by `RegAlloc::host_call`.

use crate::hostloc::{Gpr, HostLoc, Xmm};

pub const ABI_RETURN: Gpr = Gpr::Rax;

pub const ABI_PARAMS: [Gpr; 4] = [Gpr::Rdi, Gpr::Rsi, Gpr::Rdx, Gpr::Rcx];

/// Saved/restored by the run-code prologue. `R15` is among them: the
/// prologue repurposes it as the JitState pointer.
pub const ABI_CALLEE_SAVED: [Gpr; 6] =
    [Gpr::Rbx, Gpr::Rbp, Gpr::R12, Gpr::R13, Gpr::R14, Gpr::R15];

/// Everything a C callee may clobber: caller-saved GPRs plus the whole
/// XMM file.
pub const ABI_CALLER_SAVED: [HostLoc; 25] = [
    HostLoc::Gpr(Gpr::Rax),
    HostLoc::Gpr(Gpr::Rcx),
    HostLoc::Gpr(Gpr::Rdx),
    HostLoc::Gpr(Gpr::Rsi),
    HostLoc::Gpr(Gpr::Rdi),
    HostLoc::Gpr(Gpr::R8),
    HostLoc::Gpr(Gpr::R9),
    HostLoc::Gpr(Gpr::R10),
    HostLoc::Gpr(Gpr::R11),
    HostLoc::Xmm(Xmm::Xmm0),
    HostLoc::Xmm(Xmm::Xmm1),
    HostLoc::Xmm(Xmm::Xmm2),
    HostLoc::Xmm(Xmm::Xmm3),
    HostLoc::Xmm(Xmm::Xmm4),
    HostLoc::Xmm(Xmm::Xmm5),
    HostLoc::Xmm(Xmm::Xmm6),
    HostLoc::Xmm(Xmm::Xmm7),
    HostLoc::Xmm(Xmm::Xmm8),
    HostLoc::Xmm(Xmm::Xmm9),
    HostLoc::Xmm(Xmm::Xmm10),
    HostLoc::Xmm(Xmm::Xmm11),
    HostLoc::Xmm(Xmm::Xmm12),
    HostLoc::Xmm(Xmm::Xmm13),
    HostLoc::Xmm(Xmm::Xmm14),
    HostLoc::Xmm(Xmm::Xmm15),
];
