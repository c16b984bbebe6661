//! IR opcodes and their static signatures.
//!
//! Each opcode declares a result type and per-argument types. `Opaque`
//! arguments accept any runtime-representable type; the emitter inspects
//! the actual width (used by the memory opcodes, whose address is U32
//! from the A32 frontend and U64 from the A64 frontend, and by the
//! pseudo-ops, whose single argument is the producing instruction).

use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Tombstone for instructions removed by the optimizer.
    Void = 0,

    // -- A32 guest state --
    A32GetRegister,
    A32SetRegister,
    A32GetExtReg32,
    A32SetExtReg32,
    A32GetExtReg64,
    A32SetExtReg64,
    A32GetCpsr,
    A32SetCpsr,
    A32GetQ,
    A32SetQ,

    // -- Flags --
    GetCFlag,
    SetNFlag,
    SetZFlag,
    SetCFlag,
    SetVFlag,
    SetCpsrNzcv,

    // -- A64 guest state --
    A64GetW,
    A64GetX,
    A64SetW,
    A64SetX,
    A64GetSP,
    A64SetSP,
    A64GetVector,
    A64SetVector,
    A64SetPC,
    SetCheckBit,

    // -- Pseudo-ops (companions; no emitter of their own) --
    GetCarryFromOp,
    GetOverflowFromOp,
    GetNzcvFromOp,

    // -- Packing / extraction --
    Pack2x32To1x64,
    LeastSignificantWord,
    MostSignificantWord,
    LeastSignificantHalf,
    LeastSignificantByte,
    MostSignificantBit,
    IsZero32,
    IsZero64,
    TestBit,

    // -- Integer arithmetic --
    Add32,
    Add64,
    Sub32,
    Sub64,
    Mul32,
    Mul64,
    SignedDiv32,
    UnsignedDiv32,

    // -- Logical --
    And32,
    And64,
    Eor32,
    Eor64,
    Or32,
    Or64,
    Not32,
    Not64,

    // -- Shifts (32-bit forms carry the shifter carry-out companion) --
    LogicalShiftLeft32,
    LogicalShiftRight32,
    ArithmeticShiftRight32,
    RotateRight32,
    RotateRightExtended,
    LogicalShiftLeft64,
    LogicalShiftRight64,
    ArithmeticShiftRight64,

    // -- Extension / byte manipulation --
    SignExtendByteToWord,
    SignExtendHalfToWord,
    SignExtendWordToLong,
    ZeroExtendByteToWord,
    ZeroExtendHalfToWord,
    ZeroExtendWordToLong,
    ByteReverseWord,
    ByteReverseHalf,
    ByteReverseDual,
    CountLeadingZeros32,
    CountLeadingZeros64,

    // -- Conditional select --
    ConditionalSelect32,
    ConditionalSelect64,

    // -- GPR <-> FP register file transfers --
    TransferToFP32,
    TransferFromFP32,
    TransferToFP64,
    TransferFromFP64,

    // -- Guest memory --
    ReadMemory8,
    ReadMemory16,
    ReadMemory32,
    ReadMemory64,
    WriteMemory8,
    WriteMemory16,
    WriteMemory32,
    WriteMemory64,

    // -- Traps --
    CallSupervisor,
    ExceptionRaised,

    // -- Return stack buffer --
    PushRSB,

    // -- Scalar floating point --
    FPAdd32,
    FPAdd64,
    FPSub32,
    FPSub64,
    FPMul32,
    FPMul64,
    FPDiv32,
    FPDiv64,
    FPAbs32,
    FPAbs64,
    FPNeg32,
    FPNeg64,

    // -- 128-bit vector --
    VectorAdd8,
    VectorAdd16,
    VectorAdd32,
    VectorAdd64,
    VectorSub8,
    VectorSub16,
    VectorSub32,
    VectorSub64,
    VectorAnd,
    VectorOr,
    VectorEor,
    VectorNot,
    VectorAbs8,
    VectorAbs16,
    VectorAbs32,
}

use Opcode::*;
use Type::*;

impl Opcode {
    pub fn result_type(self) -> Type {
        match self {
            Opcode::Void => Type::Void,
            A32GetRegister | A32GetCpsr => U32,
            A32GetExtReg32 => F32,
            A32GetExtReg64 => F64,
            A32GetQ => F128,
            A64GetW => U32,
            A64GetX | A64GetSP => U64,
            A64GetVector => F128,
            GetCFlag => U1,
            GetCarryFromOp | GetOverflowFromOp => U1,
            GetNzcvFromOp => Nzcv,
            Pack2x32To1x64 => U64,
            LeastSignificantWord | MostSignificantWord => U32,
            LeastSignificantHalf => U16,
            LeastSignificantByte => U8,
            MostSignificantBit | IsZero32 | IsZero64 | TestBit => U1,
            Add32 | Sub32 | Mul32 | SignedDiv32 | UnsignedDiv32 => U32,
            Add64 | Sub64 | Mul64 => U64,
            And32 | Eor32 | Or32 | Not32 => U32,
            And64 | Eor64 | Or64 | Not64 => U64,
            LogicalShiftLeft32 | LogicalShiftRight32 | ArithmeticShiftRight32
            | RotateRight32 | RotateRightExtended => U32,
            LogicalShiftLeft64 | LogicalShiftRight64 | ArithmeticShiftRight64 => U64,
            SignExtendByteToWord | SignExtendHalfToWord => U32,
            ZeroExtendByteToWord | ZeroExtendHalfToWord => U32,
            SignExtendWordToLong | ZeroExtendWordToLong => U64,
            ByteReverseWord => U32,
            ByteReverseHalf => U16,
            ByteReverseDual => U64,
            CountLeadingZeros32 => U32,
            CountLeadingZeros64 => U64,
            ConditionalSelect32 => U32,
            ConditionalSelect64 => U64,
            TransferToFP32 => F32,
            TransferFromFP32 => U32,
            TransferToFP64 => F64,
            TransferFromFP64 => U64,
            ReadMemory8 => U8,
            ReadMemory16 => U16,
            ReadMemory32 => U32,
            ReadMemory64 => U64,
            FPAdd32 | FPSub32 | FPMul32 | FPDiv32 | FPAbs32 | FPNeg32 => F32,
            FPAdd64 | FPSub64 | FPMul64 | FPDiv64 | FPAbs64 | FPNeg64 => F64,
            VectorAdd8 | VectorAdd16 | VectorAdd32 | VectorAdd64
            | VectorSub8 | VectorSub16 | VectorSub32 | VectorSub64
            | VectorAnd | VectorOr | VectorEor | VectorNot
            | VectorAbs8 | VectorAbs16 | VectorAbs32 => F128,
            _ => Type::Void,
        }
    }

    pub fn arg_types(self) -> &'static [Type] {
        match self {
            Opcode::Void | A32GetCpsr | A64GetSP | GetCFlag => &[],
            A32GetRegister => &[A32Reg],
            A32SetRegister => &[A32Reg, U32],
            A32GetExtReg32 => &[A32ExtReg],
            A32SetExtReg32 => &[A32ExtReg, F32],
            A32GetExtReg64 => &[A32ExtReg],
            A32SetExtReg64 => &[A32ExtReg, F64],
            A32SetCpsr => &[U32],
            A32GetQ => &[A32ExtReg],
            A32SetQ => &[A32ExtReg, F128],
            SetNFlag | SetZFlag | SetCFlag | SetVFlag => &[U1],
            SetCpsrNzcv => &[Nzcv],
            A64GetW | A64GetX => &[A64Reg],
            A64SetW => &[A64Reg, U32],
            A64SetX => &[A64Reg, U64],
            A64SetSP => &[U64],
            A64GetVector => &[A64Vec],
            A64SetVector => &[A64Vec, F128],
            A64SetPC => &[U64],
            SetCheckBit => &[U1],
            GetCarryFromOp | GetOverflowFromOp | GetNzcvFromOp => &[Opaque],
            Pack2x32To1x64 => &[U32, U32],
            LeastSignificantWord | MostSignificantWord => &[U64],
            LeastSignificantHalf | LeastSignificantByte | IsZero32 => &[U32],
            // Width-polymorphic; the emitter inspects the operand.
            MostSignificantBit => &[Opaque],
            IsZero64 => &[U64],
            TestBit => &[U32, U8],
            Add32 | Sub32 => &[U32, U32, U1],
            Add64 | Sub64 => &[U64, U64, U1],
            Mul32 | SignedDiv32 | UnsignedDiv32 | And32 | Eor32 | Or32 => &[U32, U32],
            Mul64 | And64 | Eor64 | Or64 => &[U64, U64],
            Not32 => &[U32],
            Not64 => &[U64],
            LogicalShiftLeft32 | LogicalShiftRight32 | ArithmeticShiftRight32
            | RotateRight32 => &[U32, U8, U1],
            RotateRightExtended => &[U32, U1],
            LogicalShiftLeft64 | LogicalShiftRight64 | ArithmeticShiftRight64 => {
                &[U64, U8]
            }
            SignExtendByteToWord | ZeroExtendByteToWord => &[U8],
            SignExtendHalfToWord | ZeroExtendHalfToWord => &[U16],
            SignExtendWordToLong | ZeroExtendWordToLong => &[U32],
            ByteReverseWord | CountLeadingZeros32 => &[U32],
            ByteReverseHalf => &[U16],
            ByteReverseDual | CountLeadingZeros64 => &[U64],
            ConditionalSelect32 => &[Cond, U32, U32],
            ConditionalSelect64 => &[Cond, U64, U64],
            TransferToFP32 => &[U32],
            TransferFromFP32 => &[F32],
            TransferToFP64 => &[U64],
            TransferFromFP64 => &[F64],
            ReadMemory8 | ReadMemory16 | ReadMemory32 | ReadMemory64 => &[Opaque],
            WriteMemory8 => &[Opaque, U8],
            WriteMemory16 => &[Opaque, U16],
            WriteMemory32 => &[Opaque, U32],
            WriteMemory64 => &[Opaque, U64],
            CallSupervisor => &[U32],
            ExceptionRaised => &[U8],
            PushRSB => &[U64],
            FPAdd32 | FPSub32 | FPMul32 | FPDiv32 => &[F32, F32],
            FPAdd64 | FPSub64 | FPMul64 | FPDiv64 => &[F64, F64],
            FPAbs32 | FPNeg32 => &[F32],
            FPAbs64 | FPNeg64 => &[F64],
            VectorAdd8 | VectorAdd16 | VectorAdd32 | VectorAdd64
            | VectorSub8 | VectorSub16 | VectorSub32 | VectorSub64
            | VectorAnd | VectorOr | VectorEor => &[F128, F128],
            VectorNot | VectorAbs8 | VectorAbs16 | VectorAbs32 => &[F128],
        }
    }

    pub fn num_args(self) -> usize {
        self.arg_types().len()
    }

    /// True for instructions that must survive dead-code elimination
    /// regardless of use count: guest-state writes, memory accesses
    /// (callbacks may observe them), traps and RSB pushes.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            A32SetRegister
                | A32SetExtReg32
                | A32SetExtReg64
                | A32SetQ
                | A32SetCpsr
                | SetNFlag
                | SetZFlag
                | SetCFlag
                | SetVFlag
                | SetCpsrNzcv
                | A64SetW
                | A64SetX
                | A64SetSP
                | A64SetVector
                | A64SetPC
                | SetCheckBit
                | ReadMemory8
                | ReadMemory16
                | ReadMemory32
                | ReadMemory64
                | WriteMemory8
                | WriteMemory16
                | WriteMemory32
                | WriteMemory64
                | CallSupervisor
                | ExceptionRaised
                | PushRSB
        )
    }

    /// Companion pseudo-ops never emit code themselves; the producing
    /// opcode's emitter binds their results.
    pub fn is_pseudo(self) -> bool {
        matches!(self, GetCarryFromOp | GetOverflowFromOp | GetNzcvFromOp)
    }

    /// Memory access through the embedder callbacks (a barrier for the
    /// get/set-elimination pass).
    pub fn is_memory_access(self) -> bool {
        matches!(
            self,
            ReadMemory8
                | ReadMemory16
                | ReadMemory32
                | ReadMemory64
                | WriteMemory8
                | WriteMemory16
                | WriteMemory32
                | WriteMemory64
        )
    }

    /// Calls out of emitted code (a barrier: the callee may observe or
    /// mutate any guest state).
    pub fn is_call(self) -> bool {
        matches!(self, CallSupervisor | ExceptionRaised)
    }

    /// Scalar FP opcodes whose behavior depends on the current FPSCR
    /// rounding/denormal mode.
    pub fn is_fpscr_controlled(self) -> bool {
        matches!(
            self,
            FPAdd32 | FPAdd64 | FPSub32 | FPSub64 | FPMul32 | FPMul64
                | FPDiv32 | FPDiv64
        )
    }

    pub fn name(self) -> &'static str {
        macro_rules! names {
            ($($v:ident),* $(,)?) => {
                match self { $(Opcode::$v => stringify!($v)),* }
            };
        }
        names!(
            Void, A32GetRegister, A32SetRegister, A32GetExtReg32,
            A32SetExtReg32, A32GetExtReg64, A32SetExtReg64, A32GetCpsr,
            A32SetCpsr, A32GetQ, A32SetQ, GetCFlag, SetNFlag, SetZFlag,
            SetCFlag, SetVFlag, SetCpsrNzcv, A64GetW, A64GetX, A64SetW,
            A64SetX, A64GetSP, A64SetSP, A64GetVector, A64SetVector,
            A64SetPC, SetCheckBit, GetCarryFromOp,
            GetOverflowFromOp, GetNzcvFromOp, Pack2x32To1x64,
            LeastSignificantWord, MostSignificantWord, LeastSignificantHalf,
            LeastSignificantByte, MostSignificantBit, IsZero32, IsZero64,
            TestBit, Add32, Add64, Sub32, Sub64, Mul32, Mul64, SignedDiv32,
            UnsignedDiv32, And32, And64, Eor32, Eor64, Or32, Or64, Not32,
            Not64, LogicalShiftLeft32, LogicalShiftRight32,
            ArithmeticShiftRight32, RotateRight32, RotateRightExtended,
            LogicalShiftLeft64, LogicalShiftRight64, ArithmeticShiftRight64,
            SignExtendByteToWord, SignExtendHalfToWord, SignExtendWordToLong,
            ZeroExtendByteToWord, ZeroExtendHalfToWord, ZeroExtendWordToLong,
            ByteReverseWord, ByteReverseHalf, ByteReverseDual,
            CountLeadingZeros32, CountLeadingZeros64, ConditionalSelect32,
            ConditionalSelect64, TransferToFP32, TransferFromFP32,
            TransferToFP64, TransferFromFP64, ReadMemory8, ReadMemory16, ReadMemory32,
            ReadMemory64, WriteMemory8, WriteMemory16, WriteMemory32,
            WriteMemory64, CallSupervisor, ExceptionRaised, PushRSB, FPAdd32, FPAdd64, FPSub32, FPSub64, FPMul32, FPMul64,
            FPDiv32, FPDiv64, FPAbs32, FPAbs64, FPNeg32, FPNeg64,
            VectorAdd8, VectorAdd16, VectorAdd32, VectorAdd64, VectorSub8,
            VectorSub16, VectorSub32, VectorSub64, VectorAnd, VectorOr,
            VectorEor, VectorNot, VectorAbs8, VectorAbs16, VectorAbs32,
        )
    }
}
