//! Host locations: the places an SSA value can live for the duration
//! of a block.

/// Host general-purpose registers. The discriminants are hardware
/// encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Gpr {
    Rax = 0, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

impl Gpr {
    pub fn from_index(i: usize) -> Gpr {
        assert!(i < 16);
        // SAFETY: repr(u8), contiguous 0..=15.
        unsafe { std::mem::transmute(i as u8) }
    }

    /// Low three bits for ModRM/SIB encoding.
    #[inline]
    pub fn low3(self) -> u8 {
        self as u8 & 7
    }

    #[inline]
    pub fn needs_rex(self) -> bool {
        self as u8 >= 8
    }
}

/// Host XMM registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Xmm {
    Xmm0 = 0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7,
    Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13, Xmm14, Xmm15,
}

impl Xmm {
    pub fn from_index(i: usize) -> Xmm {
        assert!(i < 16);
        // SAFETY: repr(u8), contiguous 0..=15.
        unsafe { std::mem::transmute(i as u8) }
    }

    #[inline]
    pub fn low3(self) -> u8 {
        self as u8 & 7
    }

    #[inline]
    pub fn needs_rex(self) -> bool {
        self as u8 >= 8
    }
}

/// Number of spill slots (16 bytes each, XMM-capable).
pub const SPILL_COUNT: usize = 64;

/// A host location: GPR, XMM register, host flag, or spill slot.
///
/// `RSP` is the host stack and `R15` holds the `JitState` pointer while
/// emitted code runs; neither is ever allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostLoc {
    Gpr(Gpr),
    Xmm(Xmm),
    CF,
    PF,
    AF,
    ZF,
    SF,
    OF,
    Spill(u8),
}

pub const HOST_LOC_COUNT: usize = 16 + 16 + 6 + SPILL_COUNT;

impl HostLoc {
    /// Dense index for per-location bookkeeping tables.
    pub fn index(self) -> usize {
        match self {
            HostLoc::Gpr(r) => r as usize,
            HostLoc::Xmm(x) => 16 + x as usize,
            HostLoc::CF => 32,
            HostLoc::PF => 33,
            HostLoc::AF => 34,
            HostLoc::ZF => 35,
            HostLoc::SF => 36,
            HostLoc::OF => 37,
            HostLoc::Spill(i) => {
                assert!((i as usize) < SPILL_COUNT, "invalid spill slot {i}");
                38 + i as usize
            }
        }
    }

    pub fn from_index(i: usize) -> HostLoc {
        match i {
            0..=15 => HostLoc::Gpr(Gpr::from_index(i)),
            16..=31 => HostLoc::Xmm(Xmm::from_index(i - 16)),
            32 => HostLoc::CF,
            33 => HostLoc::PF,
            34 => HostLoc::AF,
            35 => HostLoc::ZF,
            36 => HostLoc::SF,
            37 => HostLoc::OF,
            _ => {
                assert!(i < HOST_LOC_COUNT);
                HostLoc::Spill((i - 38) as u8)
            }
        }
    }

    pub fn is_gpr(self) -> bool {
        matches!(self, HostLoc::Gpr(_))
    }

    pub fn is_xmm(self) -> bool {
        matches!(self, HostLoc::Xmm(_))
    }

    pub fn is_register(self) -> bool {
        self.is_gpr() || self.is_xmm()
    }

    pub fn is_flag(self) -> bool {
        matches!(
            self,
            HostLoc::CF | HostLoc::PF | HostLoc::AF | HostLoc::ZF | HostLoc::SF | HostLoc::OF
        )
    }

    pub fn is_spill(self) -> bool {
        matches!(self, HostLoc::Spill(_))
    }

    pub fn gpr(self) -> Gpr {
        match self {
            HostLoc::Gpr(r) => r,
            _ => panic!("{self:?} is not a GPR"),
        }
    }

    pub fn xmm(self) -> Xmm {
        match self {
            HostLoc::Xmm(x) => x,
            _ => panic!("{self:?} is not an XMM register"),
        }
    }

    /// Width a value may occupy here, in bits.
    pub fn bit_width(self) -> u32 {
        match self {
            HostLoc::Gpr(_) => 64,
            HostLoc::Xmm(_) => 128,
            HostLoc::Spill(_) => 128,
            _ => 1,
        }
    }

    pub fn same_class(a: HostLoc, b: HostLoc) -> bool {
        (a.is_gpr() && b.is_gpr())
            || (a.is_xmm() && b.is_xmm())
            || (a.is_spill() && b.is_spill())
    }
}

/// Allocation order for GPRs. `RSP` is the host stack and `R15` the
/// JitState pointer; both are reserved.
pub const ANY_GPR: &[HostLoc] = &[
    HostLoc::Gpr(Gpr::Rax),
    HostLoc::Gpr(Gpr::Rbx),
    HostLoc::Gpr(Gpr::Rcx),
    HostLoc::Gpr(Gpr::Rdx),
    HostLoc::Gpr(Gpr::Rsi),
    HostLoc::Gpr(Gpr::Rdi),
    HostLoc::Gpr(Gpr::Rbp),
    HostLoc::Gpr(Gpr::R8),
    HostLoc::Gpr(Gpr::R9),
    HostLoc::Gpr(Gpr::R10),
    HostLoc::Gpr(Gpr::R11),
    HostLoc::Gpr(Gpr::R12),
    HostLoc::Gpr(Gpr::R13),
    HostLoc::Gpr(Gpr::R14),
];

pub const ANY_XMM: &[HostLoc] = &[
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
