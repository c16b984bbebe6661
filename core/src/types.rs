//! Closed type set of the IR plus the guest-visible enums shared by the
//! frontend and backend.

use std::fmt;

/// Type of an SSA value.
///
/// `Opaque` is a wildcard used by opcodes that accept more than one
/// concrete width (the emitter inspects the actual argument); the guest
/// register enums are only ever immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    Void = 0,
    Opaque,
    Nzcv,
    Cond,
    A32Reg,
    A32ExtReg,
    A64Reg,
    A64Vec,
    CoprocInfo,
    U1,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    F128,
}

impl Type {
    /// Minimum number of bits required to hold a value of this type at
    /// runtime. Non-runtime types (register names, conditions) have no
    /// width and must never reach the register allocator.
    pub fn bit_width(self) -> u32 {
        match self {
            Type::U1 | Type::U8 => 8,
            Type::U16 => 16,
            Type::U32 | Type::F32 | Type::Nzcv => 32,
            Type::U64 | Type::F64 => 64,
            Type::F128 => 128,
            _ => panic!("type {self:?} has no runtime representation"),
        }
    }

    pub fn is_runtime_representable(self) -> bool {
        matches!(
            self,
            Type::U1
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
                | Type::F32
                | Type::F64
                | Type::F128
                | Type::Nzcv
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// ARM condition codes. The numeric values are the guest encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    EQ = 0b0000,
    NE = 0b0001,
    CS = 0b0010,
    CC = 0b0011,
    MI = 0b0100,
    PL = 0b0101,
    VS = 0b0110,
    VC = 0b0111,
    HI = 0b1000,
    LS = 0b1001,
    GE = 0b1010,
    LT = 0b1011,
    GT = 0b1100,
    LE = 0b1101,
    AL = 0b1110,
    NV = 0b1111,
}

impl Cond {
    pub fn from_bits(bits: u32) -> Cond {
        match bits & 0xF {
            0b0000 => Cond::EQ,
            0b0001 => Cond::NE,
            0b0010 => Cond::CS,
            0b0011 => Cond::CC,
            0b0100 => Cond::MI,
            0b0101 => Cond::PL,
            0b0110 => Cond::VS,
            0b0111 => Cond::VC,
            0b1000 => Cond::HI,
            0b1001 => Cond::LS,
            0b1010 => Cond::GE,
            0b1011 => Cond::LT,
            0b1100 => Cond::GT,
            0b1101 => Cond::LE,
            0b1110 => Cond::AL,
            _ => Cond::NV,
        }
    }

    /// The condition that passes exactly when `self` fails.
    pub fn invert(self) -> Cond {
        Cond::from_bits(self as u32 ^ 1)
    }

    /// Evaluate against a guest-layout NZCV word (N=31, Z=30, C=29, V=28).
    pub fn passed(self, nzcv: u32) -> bool {
        let n = nzcv & (1 << 31) != 0;
        let z = nzcv & (1 << 30) != 0;
        let c = nzcv & (1 << 29) != 0;
        let v = nzcv & (1 << 28) != 0;
        match self {
            Cond::EQ => z,
            Cond::NE => !z,
            Cond::CS => c,
            Cond::CC => !c,
            Cond::MI => n,
            Cond::PL => !n,
            Cond::VS => v,
            Cond::VC => !v,
            Cond::HI => c && !z,
            Cond::LS => !c || z,
            Cond::GE => n == v,
            Cond::LT => n != v,
            Cond::GT => !z && n == v,
            Cond::LE => z || n != v,
            Cond::AL | Cond::NV => true,
        }
    }
}

/// A32 core register names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
#[rustfmt::skip]
pub enum A32Reg {
    R0, R1, R2, R3, R4, R5, R6, R7,
    R8, R9, R10, R11, R12, SP, LR, PC,
}

impl A32Reg {
    pub fn from_bits(bits: u32) -> A32Reg {
        assert!(bits < 16, "invalid A32 register number {bits}");
        // SAFETY: repr(u8), contiguous 0..=15, bounds checked above.
        unsafe { std::mem::transmute(bits as u8) }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A32 extension register: S0-S31 as singles, D0-D31 as doubles,
/// Q0-Q15 as quads. D2i/D2i+1 alias Qi; S2i/S2i+1 alias Di for i < 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum A32ExtReg {
    S(u8),
    D(u8),
    Q(u8),
}

impl A32ExtReg {
    pub fn single(index: u32) -> A32ExtReg {
        assert!(index < 32, "invalid S register {index}");
        A32ExtReg::S(index as u8)
    }

    pub fn double(index: u32) -> A32ExtReg {
        assert!(index < 32, "invalid D register {index}");
        A32ExtReg::D(index as u8)
    }

    pub fn quad(index: u32) -> A32ExtReg {
        assert!(index < 16, "invalid Q register {index}");
        A32ExtReg::Q(index as u8)
    }
}

/// A64 general register number. 0-30 are X registers; 31 is context
/// dependent (SP or XZR) and is resolved by the translator before it
/// reaches the IR, so only 0..=30 appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct A64Reg(pub u8);

impl A64Reg {
    pub fn from_bits(bits: u32) -> A64Reg {
        assert!(bits < 31, "invalid A64 register number {bits}");
        A64Reg(bits as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A64 vector register Q0-Q31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct A64Vec(pub u8);

impl A64Vec {
    pub fn from_bits(bits: u32) -> A64Vec {
        assert!(bits < 32, "invalid A64 vector register {bits}");
        A64Vec(bits as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Guest exceptions surfaced through the `ExceptionRaised` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Exception {
    UndefinedInstruction = 0,
    UnpredictableInstruction,
    Breakpoint,
}

impl Exception {
    pub fn from_code(code: u8) -> Exception {
        match code {
            0 => Exception::UndefinedInstruction,
            1 => Exception::UnpredictableInstruction,
            2 => Exception::Breakpoint,
            _ => panic!("invalid exception code {code}"),
        }
    }
}
