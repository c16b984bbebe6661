//! Typed factory interface over a [`Block`] under construction.
//!
//! Every factory appends one instruction, type-checks its operands
//! against the opcode table, bumps operand use counts and returns the
//! result as a [`Value`]. Opcodes with a side-channel result (the
//! shifter carry-out, add/sub carry and overflow) eagerly attach their
//! companion pseudo-ops; unused companions are swept by dead-code
//! elimination before the block reaches the backend.

use crate::block::{Block, InstIndex, Terminal};
use crate::location::LocationDescriptor;
use crate::opcode::Opcode;
use crate::types::{A32ExtReg, A32Reg, A64Reg, A64Vec, Cond, Exception};
use crate::value::Value;

/// A main result together with the shifter/arithmetic carry-out.
#[derive(Debug, Clone, Copy)]
pub struct ResultAndCarry {
    pub result: Value,
    pub carry: Value,
}

pub struct IrEmitter {
    pub block: Block,
    pub current_location: LocationDescriptor,
}

impl IrEmitter {
    pub fn new(location: LocationDescriptor) -> IrEmitter {
        IrEmitter {
            block: Block::new(location),
            current_location: location,
        }
    }

    fn inst(&mut self, op: Opcode, args: &[Value]) -> Value {
        let idx = self.block.append(op, args);
        self.block.inst(idx).value_of(idx)
    }

    fn inst_idx(&mut self, op: Opcode, args: &[Value]) -> InstIndex {
        self.block.append(op, args)
    }

    // -- Immediates --

    pub fn imm1(&self, v: bool) -> Value {
        Value::ImmU1(v)
    }

    pub fn imm8(&self, v: u8) -> Value {
        Value::ImmU8(v)
    }

    pub fn imm16(&self, v: u16) -> Value {
        Value::ImmU16(v)
    }

    pub fn imm32(&self, v: u32) -> Value {
        Value::ImmU32(v)
    }

    pub fn imm64(&self, v: u64) -> Value {
        Value::ImmU64(v)
    }

    // -- Companions --

    /// Carry-out of a carry-producing instruction.
    pub fn carry_from(&mut self, op: Value) -> Value {
        let producer = op.inst().expect("carry companion of an immediate");
        if let Some(existing) = self.block.inst(producer).carry_inst {
            return self.block.inst(existing).value_of(existing);
        }
        let idx = self.inst_idx(Opcode::GetCarryFromOp, &[op]);
        self.block.inst_mut(producer).carry_inst = Some(idx);
        self.block.inst(idx).value_of(idx)
    }

    /// Signed overflow of an add/sub instruction.
    pub fn overflow_from(&mut self, op: Value) -> Value {
        let producer = op.inst().expect("overflow companion of an immediate");
        if let Some(existing) = self.block.inst(producer).overflow_inst {
            return self.block.inst(existing).value_of(existing);
        }
        let idx = self.inst_idx(Opcode::GetOverflowFromOp, &[op]);
        self.block.inst_mut(producer).overflow_inst = Some(idx);
        self.block.inst(idx).value_of(idx)
    }

    /// Packed NZCV of an add/sub instruction.
    pub fn nzcv_from(&mut self, op: Value) -> Value {
        let producer = op.inst().expect("nzcv companion of an immediate");
        if let Some(existing) = self.block.inst(producer).nzcv_inst {
            return self.block.inst(existing).value_of(existing);
        }
        let idx = self.inst_idx(Opcode::GetNzcvFromOp, &[op]);
        self.block.inst_mut(producer).nzcv_inst = Some(idx);
        self.block.inst(idx).value_of(idx)
    }

    // -- A32 guest state --

    pub fn get_register(&mut self, reg: A32Reg) -> Value {
        assert!(reg != A32Reg::PC, "read PC via current_location instead");
        self.inst(Opcode::A32GetRegister, &[Value::ImmA32Reg(reg)])
    }

    pub fn set_register(&mut self, reg: A32Reg, value: Value) -> Value {
        self.inst(Opcode::A32SetRegister, &[Value::ImmA32Reg(reg), value])
    }

    pub fn get_ext_reg32(&mut self, reg: A32ExtReg) -> Value {
        assert!(matches!(reg, A32ExtReg::S(_)));
        self.inst(Opcode::A32GetExtReg32, &[Value::ImmA32ExtReg(reg)])
    }

    pub fn set_ext_reg32(&mut self, reg: A32ExtReg, value: Value) -> Value {
        assert!(matches!(reg, A32ExtReg::S(_)));
        self.inst(Opcode::A32SetExtReg32, &[Value::ImmA32ExtReg(reg), value])
    }

    pub fn get_ext_reg64(&mut self, reg: A32ExtReg) -> Value {
        assert!(matches!(reg, A32ExtReg::D(_)));
        self.inst(Opcode::A32GetExtReg64, &[Value::ImmA32ExtReg(reg)])
    }

    pub fn set_ext_reg64(&mut self, reg: A32ExtReg, value: Value) -> Value {
        assert!(matches!(reg, A32ExtReg::D(_)));
        self.inst(Opcode::A32SetExtReg64, &[Value::ImmA32ExtReg(reg), value])
    }

    pub fn get_q(&mut self, reg: A32ExtReg) -> Value {
        assert!(matches!(reg, A32ExtReg::Q(_)));
        self.inst(Opcode::A32GetQ, &[Value::ImmA32ExtReg(reg)])
    }

    pub fn set_q(&mut self, reg: A32ExtReg, value: Value) -> Value {
        assert!(matches!(reg, A32ExtReg::Q(_)));
        self.inst(Opcode::A32SetQ, &[Value::ImmA32ExtReg(reg), value])
    }

    pub fn get_cpsr(&mut self) -> Value {
        self.inst(Opcode::A32GetCpsr, &[])
    }

    pub fn set_cpsr(&mut self, value: Value) -> Value {
        self.inst(Opcode::A32SetCpsr, &[value])
    }

    // -- Flags --

    pub fn get_c_flag(&mut self) -> Value {
        self.inst(Opcode::GetCFlag, &[])
    }

    pub fn set_n_flag(&mut self, value: Value) -> Value {
        self.inst(Opcode::SetNFlag, &[value])
    }

    pub fn set_z_flag(&mut self, value: Value) -> Value {
        self.inst(Opcode::SetZFlag, &[value])
    }

    pub fn set_c_flag(&mut self, value: Value) -> Value {
        self.inst(Opcode::SetCFlag, &[value])
    }

    pub fn set_v_flag(&mut self, value: Value) -> Value {
        self.inst(Opcode::SetVFlag, &[value])
    }

    pub fn set_cpsr_nzcv(&mut self, nzcv: Value) -> Value {
        self.inst(Opcode::SetCpsrNzcv, &[nzcv])
    }

    /// N and Z from a result value, C from the shifter carry.
    /// The common tail of flag-setting A32 data-processing instructions.
    pub fn set_nzc_from_result(&mut self, result: Value, carry: Value) {
        let n = self.most_significant_bit(result);
        self.set_n_flag(n);
        let z = self.is_zero_32(result);
        self.set_z_flag(z);
        self.set_c_flag(carry);
    }

    // -- A64 guest state --

    pub fn a64_get_w(&mut self, reg: A64Reg) -> Value {
        self.inst(Opcode::A64GetW, &[Value::ImmA64Reg(reg)])
    }

    pub fn a64_get_x(&mut self, reg: A64Reg) -> Value {
        self.inst(Opcode::A64GetX, &[Value::ImmA64Reg(reg)])
    }

    pub fn a64_set_w(&mut self, reg: A64Reg, value: Value) -> Value {
        self.inst(Opcode::A64SetW, &[Value::ImmA64Reg(reg), value])
    }

    pub fn a64_set_x(&mut self, reg: A64Reg, value: Value) -> Value {
        self.inst(Opcode::A64SetX, &[Value::ImmA64Reg(reg), value])
    }

    pub fn a64_get_sp(&mut self) -> Value {
        self.inst(Opcode::A64GetSP, &[])
    }

    pub fn a64_set_sp(&mut self, value: Value) -> Value {
        self.inst(Opcode::A64SetSP, &[value])
    }

    pub fn a64_get_vector(&mut self, reg: A64Vec) -> Value {
        self.inst(Opcode::A64GetVector, &[Value::ImmA64Vec(reg)])
    }

    pub fn a64_set_vector(&mut self, reg: A64Vec, value: Value) -> Value {
        self.inst(Opcode::A64SetVector, &[Value::ImmA64Vec(reg), value])
    }

    pub fn a64_set_pc(&mut self, value: Value) -> Value {
        self.inst(Opcode::A64SetPC, &[value])
    }

    pub fn set_check_bit(&mut self, value: Value) -> Value {
        self.inst(Opcode::SetCheckBit, &[value])
    }

    // -- Packing / extraction --

    pub fn pack_2x32_to_1x64(&mut self, lo: Value, hi: Value) -> Value {
        self.inst(Opcode::Pack2x32To1x64, &[lo, hi])
    }

    pub fn least_significant_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantWord, &[value])
    }

    pub fn most_significant_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::MostSignificantWord, &[value])
    }

    pub fn least_significant_half(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantHalf, &[value])
    }

    pub fn least_significant_byte(&mut self, value: Value) -> Value {
        self.inst(Opcode::LeastSignificantByte, &[value])
    }

    pub fn most_significant_bit(&mut self, value: Value) -> Value {
        self.inst(Opcode::MostSignificantBit, &[value])
    }

    pub fn is_zero_32(&mut self, value: Value) -> Value {
        self.inst(Opcode::IsZero32, &[value])
    }

    pub fn is_zero_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::IsZero64, &[value])
    }

    pub fn test_bit(&mut self, value: Value, bit: u8) -> Value {
        self.inst(Opcode::TestBit, &[value, Value::ImmU8(bit)])
    }

    // -- Integer arithmetic --

    /// `a + b + carry_in`. Carry, overflow and NZCV companions are
    /// available via [`carry_from`](Self::carry_from) etc.
    pub fn add_with_carry(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Add32, &[a, b, carry_in])
    }

    pub fn add(&mut self, a: Value, b: Value) -> Value {
        let zero = self.imm1(false);
        self.add_with_carry(a, b, zero)
    }

    pub fn add64(&mut self, a: Value, b: Value) -> Value {
        let zero = self.imm1(false);
        self.inst(Opcode::Add64, &[a, b, zero])
    }

    /// `a - b - !carry_in` (ARM-style borrow: carry_in = 1 means no
    /// borrow).
    pub fn sub_with_carry(&mut self, a: Value, b: Value, carry_in: Value) -> Value {
        self.inst(Opcode::Sub32, &[a, b, carry_in])
    }

    pub fn sub(&mut self, a: Value, b: Value) -> Value {
        let one = self.imm1(true);
        self.sub_with_carry(a, b, one)
    }

    pub fn sub64(&mut self, a: Value, b: Value) -> Value {
        let one = self.imm1(true);
        self.inst(Opcode::Sub64, &[a, b, one])
    }

    pub fn mul(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Mul32, &[a, b])
    }

    pub fn mul64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Mul64, &[a, b])
    }

    /// ARM division: division by zero yields zero, no trap.
    pub fn signed_div(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::SignedDiv32, &[a, b])
    }

    pub fn unsigned_div(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::UnsignedDiv32, &[a, b])
    }

    // -- Logical --

    pub fn and_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::And32, &[a, b])
    }

    pub fn and_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::And64, &[a, b])
    }

    pub fn eor_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Eor32, &[a, b])
    }

    pub fn eor_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Eor64, &[a, b])
    }

    pub fn or_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Or32, &[a, b])
    }

    pub fn or_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::Or64, &[a, b])
    }

    pub fn not_32(&mut self, a: Value) -> Value {
        self.inst(Opcode::Not32, &[a])
    }

    pub fn not_64(&mut self, a: Value) -> Value {
        self.inst(Opcode::Not64, &[a])
    }

    // -- Shifts --

    pub fn logical_shift_left(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.inst(Opcode::LogicalShiftLeft32, &[value, shift, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_right(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.inst(Opcode::LogicalShiftRight32, &[value, shift, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn arithmetic_shift_right(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result =
            self.inst(Opcode::ArithmeticShiftRight32, &[value, shift, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn rotate_right(
        &mut self,
        value: Value,
        shift: Value,
        carry_in: Value,
    ) -> ResultAndCarry {
        let result = self.inst(Opcode::RotateRight32, &[value, shift, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn rotate_right_extended(&mut self, value: Value, carry_in: Value) -> ResultAndCarry {
        let result = self.inst(Opcode::RotateRightExtended, &[value, carry_in]);
        let carry = self.carry_from(result);
        ResultAndCarry { result, carry }
    }

    pub fn logical_shift_left_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::LogicalShiftLeft64, &[value, shift])
    }

    pub fn logical_shift_right_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::LogicalShiftRight64, &[value, shift])
    }

    pub fn arithmetic_shift_right_64(&mut self, value: Value, shift: Value) -> Value {
        self.inst(Opcode::ArithmeticShiftRight64, &[value, shift])
    }

    // -- Extension / byte manipulation --

    pub fn sign_extend_byte_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendByteToWord, &[value])
    }

    pub fn sign_extend_half_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendHalfToWord, &[value])
    }

    pub fn sign_extend_word_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::SignExtendWordToLong, &[value])
    }

    pub fn zero_extend_byte_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendByteToWord, &[value])
    }

    pub fn zero_extend_half_to_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendHalfToWord, &[value])
    }

    pub fn zero_extend_word_to_long(&mut self, value: Value) -> Value {
        self.inst(Opcode::ZeroExtendWordToLong, &[value])
    }

    pub fn byte_reverse_word(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseWord, &[value])
    }

    pub fn byte_reverse_half(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseHalf, &[value])
    }

    pub fn byte_reverse_dual(&mut self, value: Value) -> Value {
        self.inst(Opcode::ByteReverseDual, &[value])
    }

    pub fn count_leading_zeros(&mut self, value: Value) -> Value {
        self.inst(Opcode::CountLeadingZeros32, &[value])
    }

    pub fn count_leading_zeros_64(&mut self, value: Value) -> Value {
        self.inst(Opcode::CountLeadingZeros64, &[value])
    }

    // -- Conditional select --

    pub fn conditional_select_32(&mut self, cond: Cond, then_: Value, else_: Value) -> Value {
        self.inst(
            Opcode::ConditionalSelect32,
            &[Value::ImmCond(cond), then_, else_],
        )
    }

    pub fn conditional_select_64(&mut self, cond: Cond, then_: Value, else_: Value) -> Value {
        self.inst(
            Opcode::ConditionalSelect64,
            &[Value::ImmCond(cond), then_, else_],
        )
    }

    // -- GPR <-> FP register file transfers --

    pub fn transfer_to_fp32(&mut self, value: Value) -> Value {
        self.inst(Opcode::TransferToFP32, &[value])
    }

    pub fn transfer_from_fp32(&mut self, value: Value) -> Value {
        self.inst(Opcode::TransferFromFP32, &[value])
    }

    pub fn transfer_to_fp64(&mut self, value: Value) -> Value {
        self.inst(Opcode::TransferToFP64, &[value])
    }

    pub fn transfer_from_fp64(&mut self, value: Value) -> Value {
        self.inst(Opcode::TransferFromFP64, &[value])
    }

    // -- Guest memory --

    pub fn read_memory_8(&mut self, vaddr: Value) -> Value {
        self.inst(Opcode::ReadMemory8, &[vaddr])
    }

    pub fn read_memory_16(&mut self, vaddr: Value) -> Value {
        self.inst(Opcode::ReadMemory16, &[vaddr])
    }

    pub fn read_memory_32(&mut self, vaddr: Value) -> Value {
        self.inst(Opcode::ReadMemory32, &[vaddr])
    }

    pub fn read_memory_64(&mut self, vaddr: Value) -> Value {
        self.inst(Opcode::ReadMemory64, &[vaddr])
    }

    pub fn write_memory_8(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::WriteMemory8, &[vaddr, value])
    }

    pub fn write_memory_16(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::WriteMemory16, &[vaddr, value])
    }

    pub fn write_memory_32(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::WriteMemory32, &[vaddr, value])
    }

    pub fn write_memory_64(&mut self, vaddr: Value, value: Value) -> Value {
        self.inst(Opcode::WriteMemory64, &[vaddr, value])
    }

    // -- Traps --

    pub fn call_supervisor(&mut self, swi: Value) -> Value {
        self.inst(Opcode::CallSupervisor, &[swi])
    }

    pub fn exception_raised(&mut self, exception: Exception) -> Value {
        self.inst(Opcode::ExceptionRaised, &[Value::ImmU8(exception as u8)])
    }

    // -- RSB --

    pub fn push_rsb(&mut self, return_location: LocationDescriptor) -> Value {
        self.inst(
            Opcode::PushRSB,
            &[Value::ImmU64(return_location.unique_hash())],
        )
    }

    // -- Scalar floating point --

    pub fn fp_add_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPAdd32, &[a, b])
    }

    pub fn fp_add_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPAdd64, &[a, b])
    }

    pub fn fp_sub_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPSub32, &[a, b])
    }

    pub fn fp_sub_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPSub64, &[a, b])
    }

    pub fn fp_mul_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPMul32, &[a, b])
    }

    pub fn fp_mul_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPMul64, &[a, b])
    }

    pub fn fp_div_32(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPDiv32, &[a, b])
    }

    pub fn fp_div_64(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::FPDiv64, &[a, b])
    }

    pub fn fp_abs_32(&mut self, a: Value) -> Value {
        self.inst(Opcode::FPAbs32, &[a])
    }

    pub fn fp_abs_64(&mut self, a: Value) -> Value {
        self.inst(Opcode::FPAbs64, &[a])
    }

    pub fn fp_neg_32(&mut self, a: Value) -> Value {
        self.inst(Opcode::FPNeg32, &[a])
    }

    pub fn fp_neg_64(&mut self, a: Value) -> Value {
        self.inst(Opcode::FPNeg64, &[a])
    }

    // -- Vector --

    pub fn vector_add(&mut self, esize: u32, a: Value, b: Value) -> Value {
        let op = match esize {
            8 => Opcode::VectorAdd8,
            16 => Opcode::VectorAdd16,
            32 => Opcode::VectorAdd32,
            64 => Opcode::VectorAdd64,
            _ => panic!("invalid vector element size {esize}"),
        };
        self.inst(op, &[a, b])
    }

    pub fn vector_sub(&mut self, esize: u32, a: Value, b: Value) -> Value {
        let op = match esize {
            8 => Opcode::VectorSub8,
            16 => Opcode::VectorSub16,
            32 => Opcode::VectorSub32,
            64 => Opcode::VectorSub64,
            _ => panic!("invalid vector element size {esize}"),
        };
        self.inst(op, &[a, b])
    }

    pub fn vector_and(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::VectorAnd, &[a, b])
    }

    pub fn vector_or(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::VectorOr, &[a, b])
    }

    pub fn vector_eor(&mut self, a: Value, b: Value) -> Value {
        self.inst(Opcode::VectorEor, &[a, b])
    }

    pub fn vector_not(&mut self, a: Value) -> Value {
        self.inst(Opcode::VectorNot, &[a])
    }

    pub fn vector_abs(&mut self, esize: u32, a: Value) -> Value {
        let op = match esize {
            8 => Opcode::VectorAbs8,
            16 => Opcode::VectorAbs16,
            32 => Opcode::VectorAbs32,
            _ => panic!("invalid vector element size {esize}"),
        };
        self.inst(op, &[a])
    }

    // -- Terminal --

    pub fn set_term(&mut self, term: Terminal) {
        self.block.set_terminal(term);
    }
}
