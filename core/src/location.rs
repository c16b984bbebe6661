//! Location descriptors — the code-cache key.
//!
//! A descriptor identifies a guest execution context: program counter,
//! ISA mode, endianness, FP mode bits and (for Thumb) the IT state.
//! The bit packing is stable: emitted host code embeds encoded
//! descriptors in immediates used by chained-block patching and by the
//! return stack buffer, so two descriptors are the same context exactly
//! when their raw words are equal.

use std::fmt;

/// ISA mode field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IsaMode {
    A32 = 0,
    Thumb = 1,
    A64 = 2,
}

/// Packed guest execution context.
///
/// Layout (bits, most significant first):
/// - 63..62 ISA mode
/// - 61     single-stepping
/// - A32/Thumb: 44..41 FPSCR mode, 40 E (big-endian data), 39..32 IT
///   state, 31..0 PC
/// - A64: 59..56 FPCR mode, 55..0 PC
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationDescriptor(u64);

const MODE_SHIFT: u32 = 62;
const STEP_BIT: u64 = 1 << 61;

const A32_FPSCR_SHIFT: u32 = 41;
const A32_FPSCR_MASK: u64 = 0xF << A32_FPSCR_SHIFT;
const A32_E_BIT: u64 = 1 << 40;
const A32_IT_SHIFT: u32 = 32;
const A32_IT_MASK: u64 = 0xFF << A32_IT_SHIFT;

const A64_FPCR_SHIFT: u32 = 56;
const A64_FPCR_MASK: u64 = 0xF << A64_FPCR_SHIFT;
const A64_PC_MASK: u64 = (1 << 56) - 1;

impl LocationDescriptor {
    pub fn a32(pc: u32, thumb: bool, big_endian: bool, fpscr_mode: u32, it_state: u8) -> Self {
        let mode = if thumb { IsaMode::Thumb } else { IsaMode::A32 };
        let mut bits = (mode as u64) << MODE_SHIFT;
        bits |= u64::from(fpscr_mode & 0xF) << A32_FPSCR_SHIFT;
        if big_endian {
            bits |= A32_E_BIT;
        }
        bits |= u64::from(it_state) << A32_IT_SHIFT;
        bits |= u64::from(pc);
        LocationDescriptor(bits)
    }

    pub fn a64(pc: u64, fpcr_mode: u32) -> Self {
        let mut bits = (IsaMode::A64 as u64) << MODE_SHIFT;
        bits |= u64::from(fpcr_mode & 0xF) << A64_FPCR_SHIFT;
        bits |= pc & A64_PC_MASK;
        LocationDescriptor(bits)
    }

    pub fn from_raw(bits: u64) -> Self {
        LocationDescriptor(bits)
    }

    /// The raw packed word. Also the hash pushed onto the RSB.
    pub fn unique_hash(self) -> u64 {
        self.0
    }

    pub fn isa_mode(self) -> IsaMode {
        match self.0 >> MODE_SHIFT {
            0 => IsaMode::A32,
            1 => IsaMode::Thumb,
            2 => IsaMode::A64,
            m => panic!("invalid ISA mode field {m}"),
        }
    }

    pub fn is_thumb(self) -> bool {
        self.isa_mode() == IsaMode::Thumb
    }

    pub fn is_a64(self) -> bool {
        self.isa_mode() == IsaMode::A64
    }

    pub fn pc(self) -> u64 {
        if self.is_a64() {
            self.0 & A64_PC_MASK
        } else {
            self.0 & 0xFFFF_FFFF
        }
    }

    pub fn big_endian(self) -> bool {
        !self.is_a64() && self.0 & A32_E_BIT != 0
    }

    pub fn it_state(self) -> u8 {
        ((self.0 & A32_IT_MASK) >> A32_IT_SHIFT) as u8
    }

    pub fn fp_mode(self) -> u32 {
        if self.is_a64() {
            ((self.0 & A64_FPCR_MASK) >> A64_FPCR_SHIFT) as u32
        } else {
            ((self.0 & A32_FPSCR_MASK) >> A32_FPSCR_SHIFT) as u32
        }
    }

    pub fn single_stepping(self) -> bool {
        self.0 & STEP_BIT != 0
    }

    pub fn set_single_stepping(self, step: bool) -> Self {
        if step {
            LocationDescriptor(self.0 | STEP_BIT)
        } else {
            LocationDescriptor(self.0 & !STEP_BIT)
        }
    }

    /// Advance the PC by `n` bytes, keeping every other field.
    pub fn advance_pc(self, n: u64) -> Self {
        if self.is_a64() {
            let pc = (self.pc().wrapping_add(n)) & A64_PC_MASK;
            LocationDescriptor((self.0 & !A64_PC_MASK) | pc)
        } else {
            let pc = (self.pc() as u32).wrapping_add(n as u32);
            LocationDescriptor((self.0 & !0xFFFF_FFFF) | u64::from(pc))
        }
    }

    pub fn with_pc(self, pc: u64) -> Self {
        if self.is_a64() {
            LocationDescriptor((self.0 & !A64_PC_MASK) | (pc & A64_PC_MASK))
        } else {
            LocationDescriptor((self.0 & !0xFFFF_FFFF) | (pc & 0xFFFF_FFFF))
        }
    }
}

impl fmt::Debug for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:?} pc={:#x}{}{}}}",
            self.isa_mode(),
            self.pc(),
            if self.big_endian() { " E" } else { "" },
            if self.single_stepping() { " step" } else { "" },
        )
    }
}
