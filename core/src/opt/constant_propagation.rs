//! Constant folding.
//!
//! Pure integer opcodes whose operands are all immediates are evaluated
//! at translation time; loads whose address is an immediate inside
//! read-only guest memory are replaced with the loaded value. A folded
//! instruction that carries companion pseudo-ops is only folded when
//! every attached companion can be evaluated too, so no companion is
//! left referencing a tombstone.

use std::collections::HashMap;

use crate::block::{Block, InstIndex};
use crate::opcode::Opcode;
use crate::opt::ReadOnlyMemory;
use crate::value::Value;

/// Main result plus optional side-channel results.
struct Folded {
    result: Value,
    carry: Option<bool>,
    overflow: Option<bool>,
    nzcv: Option<u32>,
}

impl Folded {
    fn plain(result: Value) -> Folded {
        Folded {
            result,
            carry: None,
            overflow: None,
            nzcv: None,
        }
    }
}

pub fn constant_propagation(block: &mut Block, rom: &dyn ReadOnlyMemory) {
    let mut subst: HashMap<InstIndex, Value> = HashMap::new();

    for idx in block.indices() {
        let nargs = block.inst(idx).num_args();
        for slot in 0..nargs {
            if let Some(src) = block.inst(idx).arg(slot).inst() {
                if let Some(&replacement) = subst.get(&src) {
                    block.replace_arg(idx, slot, replacement);
                }
            }
        }

        let op = block.inst(idx).op;
        if op == Opcode::Void || op.is_pseudo() {
            continue;
        }

        let all_imm = block.inst(idx).args().iter().all(|a| a.is_immediate());
        if !all_imm {
            continue;
        }

        let folded = if op.is_memory_access() {
            fold_rom_load(block, idx, rom)
        } else {
            fold_pure(block, idx)
        };

        let Some(folded) = folded else { continue };

        // Companions must fold along with the producer or not at all.
        let inst = block.inst(idx);
        let (carry_inst, overflow_inst, nzcv_inst) =
            (inst.carry_inst, inst.overflow_inst, inst.nzcv_inst);
        if (carry_inst.is_some() && folded.carry.is_none())
            || (overflow_inst.is_some() && folded.overflow.is_none())
            || (nzcv_inst.is_some() && folded.nzcv.is_none())
        {
            continue;
        }

        if let Some(c) = carry_inst {
            subst.insert(c, Value::ImmU1(folded.carry.unwrap()));
            block.remove(c);
        }
        if let Some(o) = overflow_inst {
            subst.insert(o, Value::ImmU1(folded.overflow.unwrap()));
            block.remove(o);
        }
        if let Some(n) = nzcv_inst {
            subst.insert(n, Value::ImmU32(folded.nzcv.unwrap()));
            block.remove(n);
        }
        subst.insert(idx, folded.result);
        block.remove(idx);
    }
}

fn fold_rom_load(block: &Block, idx: InstIndex, rom: &dyn ReadOnlyMemory) -> Option<Folded> {
    let op = block.inst(idx).op;
    let size = match op {
        Opcode::ReadMemory8 => 1,
        Opcode::ReadMemory16 => 2,
        Opcode::ReadMemory32 => 4,
        Opcode::ReadMemory64 => 8,
        _ => return None,
    };
    let vaddr = block.inst(idx).arg(0).imm_to_u64();
    let value = rom.read_const(vaddr, size)?;
    Some(Folded::plain(match op {
        Opcode::ReadMemory8 => Value::ImmU8(value as u8),
        Opcode::ReadMemory16 => Value::ImmU16(value as u16),
        Opcode::ReadMemory32 => Value::ImmU32(value as u32),
        Opcode::ReadMemory64 => Value::ImmU64(value),
        _ => unreachable!(),
    }))
}

fn fold_pure(block: &Block, idx: InstIndex) -> Option<Folded> {
    let inst = block.inst(idx);
    let arg = |i: usize| inst.arg(i);
    let folded = match inst.op {
        Opcode::Add32 | Opcode::Sub32 => {
            let a = arg(0).imm_u32();
            let b = arg(1).imm_u32();
            let carry_in = arg(2).imm_u1();
            let b = if inst.op == Opcode::Sub32 { !b } else { b };
            let wide =
                u64::from(a) + u64::from(b) + u64::from(carry_in);
            let result = wide as u32;
            let carry = wide > u64::from(u32::MAX);
            let overflow = (!(a ^ b) & (a ^ result)) >> 31 != 0;
            let n = result >> 31 != 0;
            let z = result == 0;
            let nzcv = (u32::from(n) << 31)
                | (u32::from(z) << 30)
                | (u32::from(carry) << 29)
                | (u32::from(overflow) << 28);
            Folded {
                result: Value::ImmU32(result),
                carry: Some(carry),
                overflow: Some(overflow),
                nzcv: Some(nzcv),
            }
        }
        Opcode::Mul32 => Folded::plain(Value::ImmU32(
            arg(0).imm_u32().wrapping_mul(arg(1).imm_u32()),
        )),
        Opcode::And32 => Folded::plain(Value::ImmU32(arg(0).imm_u32() & arg(1).imm_u32())),
        Opcode::Eor32 => Folded::plain(Value::ImmU32(arg(0).imm_u32() ^ arg(1).imm_u32())),
        Opcode::Or32 => Folded::plain(Value::ImmU32(arg(0).imm_u32() | arg(1).imm_u32())),
        Opcode::Not32 => Folded::plain(Value::ImmU32(!arg(0).imm_u32())),
        Opcode::And64 => Folded::plain(Value::ImmU64(arg(0).imm_u64() & arg(1).imm_u64())),
        Opcode::Eor64 => Folded::plain(Value::ImmU64(arg(0).imm_u64() ^ arg(1).imm_u64())),
        Opcode::Or64 => Folded::plain(Value::ImmU64(arg(0).imm_u64() | arg(1).imm_u64())),
        Opcode::Not64 => Folded::plain(Value::ImmU64(!arg(0).imm_u64())),
        Opcode::LogicalShiftLeft32 => {
            let value = arg(0).imm_u32();
            let shift = arg(1).imm_u8() as u32;
            let carry_in = arg(2).imm_u1();
            let (result, carry) = if shift == 0 {
                (value, carry_in)
            } else if shift <= 32 {
                let carry = if shift == 32 {
                    value & 1 != 0
                } else {
                    (value >> (32 - shift)) & 1 != 0
                };
                (value.checked_shl(shift).unwrap_or(0), carry)
            } else {
                (0, false)
            };
            Folded {
                result: Value::ImmU32(result),
                carry: Some(carry),
                overflow: None,
                nzcv: None,
            }
        }
        Opcode::LogicalShiftRight32 => {
            let value = arg(0).imm_u32();
            let shift = arg(1).imm_u8() as u32;
            let carry_in = arg(2).imm_u1();
            let (result, carry) = if shift == 0 {
                (value, carry_in)
            } else if shift < 32 {
                (value >> shift, (value >> (shift - 1)) & 1 != 0)
            } else if shift == 32 {
                (0, value >> 31 != 0)
            } else {
                (0, false)
            };
            Folded {
                result: Value::ImmU32(result),
                carry: Some(carry),
                overflow: None,
                nzcv: None,
            }
        }
        Opcode::ArithmeticShiftRight32 => {
            let value = arg(0).imm_u32();
            let shift = arg(1).imm_u8() as u32;
            let carry_in = arg(2).imm_u1();
            let (result, carry) = if shift == 0 {
                (value, carry_in)
            } else if shift < 32 {
                (
                    ((value as i32) >> shift) as u32,
                    (value >> (shift - 1)) & 1 != 0,
                )
            } else {
                (((value as i32) >> 31) as u32, value >> 31 != 0)
            };
            Folded {
                result: Value::ImmU32(result),
                carry: Some(carry),
                overflow: None,
                nzcv: None,
            }
        }
        Opcode::RotateRight32 => {
            let value = arg(0).imm_u32();
            let shift = arg(1).imm_u8() as u32;
            let carry_in = arg(2).imm_u1();
            let (result, carry) = if shift == 0 {
                (value, carry_in)
            } else {
                let r = value.rotate_right(shift % 32);
                (r, r >> 31 != 0)
            };
            Folded {
                result: Value::ImmU32(result),
                carry: Some(carry),
                overflow: None,
                nzcv: None,
            }
        }
        Opcode::RotateRightExtended => {
            let value = arg(0).imm_u32();
            let carry_in = arg(1).imm_u1();
            let result = (value >> 1) | (u32::from(carry_in) << 31);
            Folded {
                result: Value::ImmU32(result),
                carry: Some(value & 1 != 0),
                overflow: None,
                nzcv: None,
            }
        }
        Opcode::LogicalShiftLeft64 => Folded::plain(Value::ImmU64(
            arg(0).imm_u64().checked_shl(arg(1).imm_u8() as u32).unwrap_or(0),
        )),
        Opcode::LogicalShiftRight64 => Folded::plain(Value::ImmU64(
            arg(0).imm_u64().checked_shr(arg(1).imm_u8() as u32).unwrap_or(0),
        )),
        Opcode::SignExtendByteToWord => {
            Folded::plain(Value::ImmU32(arg(0).imm_u8() as i8 as i32 as u32))
        }
        Opcode::SignExtendHalfToWord => Folded::plain(Value::ImmU32(match arg(0) {
            Value::ImmU16(v) => v as i16 as i32 as u32,
            _ => return None,
        })),
        Opcode::SignExtendWordToLong => {
            Folded::plain(Value::ImmU64(arg(0).imm_u32() as i32 as i64 as u64))
        }
        Opcode::ZeroExtendByteToWord => {
            Folded::plain(Value::ImmU32(u32::from(arg(0).imm_u8())))
        }
        Opcode::ZeroExtendHalfToWord => Folded::plain(Value::ImmU32(match arg(0) {
            Value::ImmU16(v) => u32::from(v),
            _ => return None,
        })),
        Opcode::ZeroExtendWordToLong => {
            Folded::plain(Value::ImmU64(u64::from(arg(0).imm_u32())))
        }
        Opcode::ByteReverseWord => {
            Folded::plain(Value::ImmU32(arg(0).imm_u32().swap_bytes()))
        }
        Opcode::ByteReverseDual => {
            Folded::plain(Value::ImmU64(arg(0).imm_u64().swap_bytes()))
        }
        Opcode::CountLeadingZeros32 => {
            Folded::plain(Value::ImmU32(arg(0).imm_u32().leading_zeros()))
        }
        Opcode::CountLeadingZeros64 => {
            Folded::plain(Value::ImmU64(u64::from(arg(0).imm_u64().leading_zeros())))
        }
        Opcode::Pack2x32To1x64 => Folded::plain(Value::ImmU64(
            u64::from(arg(0).imm_u32()) | (u64::from(arg(1).imm_u32()) << 32),
        )),
        Opcode::LeastSignificantWord => {
            Folded::plain(Value::ImmU32(arg(0).imm_u64() as u32))
        }
        Opcode::MostSignificantWord => {
            Folded::plain(Value::ImmU32((arg(0).imm_u64() >> 32) as u32))
        }
        Opcode::LeastSignificantHalf => {
            Folded::plain(Value::ImmU16(arg(0).imm_u32() as u16))
        }
        Opcode::LeastSignificantByte => {
            Folded::plain(Value::ImmU8(arg(0).imm_u32() as u8))
        }
        Opcode::MostSignificantBit => Folded::plain(Value::ImmU1(match arg(0) {
            Value::ImmU32(v) => v >> 31 != 0,
            Value::ImmU64(v) => v >> 63 != 0,
            _ => return None,
        })),
        Opcode::IsZero32 => Folded::plain(Value::ImmU1(arg(0).imm_u32() == 0)),
        Opcode::TestBit => Folded::plain(Value::ImmU1(
            arg(0).imm_u32() >> arg(1).imm_u8() & 1 != 0,
        )),
        Opcode::IsZero64 => Folded::plain(Value::ImmU1(arg(0).imm_u64() == 0)),
        _ => return None,
    };
    Some(folded)
}
