//! IR values — immediates or references to instructions.

use crate::block::InstIndex;
use crate::types::{A32ExtReg, A32Reg, A64Reg, A64Vec, Cond, Type};

/// An SSA value: either an immediate carrying its literal, or a
/// reference (by arena index) to the instruction that computes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Result of an earlier instruction. The type is the opcode's
    /// declared result type; it is cached here so operand checks do not
    /// need the arena.
    Inst(InstIndex, Type),
    ImmU1(bool),
    ImmU8(u8),
    ImmU16(u16),
    ImmU32(u32),
    ImmU64(u64),
    ImmA32Reg(A32Reg),
    ImmA32ExtReg(A32ExtReg),
    ImmA64Reg(A64Reg),
    ImmA64Vec(A64Vec),
    ImmCond(Cond),
}

impl Value {
    pub fn ty(self) -> Type {
        match self {
            Value::Inst(_, ty) => ty,
            Value::ImmU1(_) => Type::U1,
            Value::ImmU8(_) => Type::U8,
            Value::ImmU16(_) => Type::U16,
            Value::ImmU32(_) => Type::U32,
            Value::ImmU64(_) => Type::U64,
            Value::ImmA32Reg(_) => Type::A32Reg,
            Value::ImmA32ExtReg(_) => Type::A32ExtReg,
            Value::ImmA64Reg(_) => Type::A64Reg,
            Value::ImmA64Vec(_) => Type::A64Vec,
            Value::ImmCond(_) => Type::Cond,
        }
    }

    pub fn is_immediate(self) -> bool {
        !matches!(self, Value::Inst(..))
    }

    pub fn inst(self) -> Option<InstIndex> {
        match self {
            Value::Inst(idx, _) => Some(idx),
            _ => None,
        }
    }

    /// Widen any integer immediate to u64. Panics on non-integer values.
    pub fn imm_to_u64(self) -> u64 {
        match self {
            Value::ImmU1(b) => u64::from(b),
            Value::ImmU8(v) => u64::from(v),
            Value::ImmU16(v) => u64::from(v),
            Value::ImmU32(v) => u64::from(v),
            Value::ImmU64(v) => v,
            _ => panic!("not an integer immediate: {self:?}"),
        }
    }

    pub fn imm_u1(self) -> bool {
        match self {
            Value::ImmU1(b) => b,
            _ => panic!("not a U1 immediate: {self:?}"),
        }
    }

    pub fn imm_u8(self) -> u8 {
        match self {
            Value::ImmU8(v) => v,
            _ => panic!("not a U8 immediate: {self:?}"),
        }
    }

    pub fn imm_u32(self) -> u32 {
        match self {
            Value::ImmU32(v) => v,
            _ => panic!("not a U32 immediate: {self:?}"),
        }
    }

    pub fn imm_u64(self) -> u64 {
        match self {
            Value::ImmU64(v) => v,
            _ => panic!("not a U64 immediate: {self:?}"),
        }
    }

    pub fn imm_a32_reg(self) -> A32Reg {
        match self {
            Value::ImmA32Reg(r) => r,
            _ => panic!("not an A32 register immediate: {self:?}"),
        }
    }

    pub fn imm_a32_ext_reg(self) -> A32ExtReg {
        match self {
            Value::ImmA32ExtReg(r) => r,
            _ => panic!("not an A32 extension register immediate: {self:?}"),
        }
    }

    pub fn imm_a64_reg(self) -> A64Reg {
        match self {
            Value::ImmA64Reg(r) => r,
            _ => panic!("not an A64 register immediate: {self:?}"),
        }
    }

    pub fn imm_a64_vec(self) -> A64Vec {
        match self {
            Value::ImmA64Vec(v) => v,
            _ => panic!("not an A64 vector register immediate: {self:?}"),
        }
    }

    pub fn imm_cond(self) -> Cond {
        match self {
            Value::ImmCond(c) => c,
            _ => panic!("not a condition immediate: {self:?}"),
        }
    }
}
