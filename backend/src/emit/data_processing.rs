//! Scalar integer opcode emitters.
//!
//! Companion pseudo-ops (`GetCarryFromOp`, `GetOverflowFromOp`,
//! `GetNzcvFromOp`) never emit code of their own: the producing
//! opcode's emitter captures the host flags with `setcc` right after
//! the flag-producing instruction and binds the companions there.
//! Register-allocator traffic between the producing instruction and
//! the captures is limited to plain moves, which leave flags alone.

use dbt_ir::block::{Block, InstIndex};
use dbt_ir::types::Type;
use dbt_ir::Cond;

use crate::block_of_code::HostFeature;
use crate::encoder::*;
use crate::hostloc::{Gpr, HostLoc};
use crate::reg_alloc::RegAlloc;

use super::{EmitX64, Extend, ShiftKind};

struct Companions {
    carry: Option<InstIndex>,
    overflow: Option<InstIndex>,
    nzcv: Option<InstIndex>,
}

fn companions(block: &Block, idx: InstIndex) -> Companions {
    let inst = block.inst(idx);
    Companions {
        carry: inst.carry_inst,
        overflow: inst.overflow_inst,
        nzcv: inst.nzcv_inst,
    }
}

impl EmitX64 {
    /// Capture a host condition into a fresh register as a 0/1 value
    /// and bind it to `inst`.
    fn capture_flag(&mut self, ra: &mut RegAlloc, inst: InstIndex, cc: Cc) {
        let reg = ra.scratch_gpr(&mut self.code);
        emit_setcc(&mut self.code, cc, reg);
        emit_movzx8(&mut self.code, reg, reg);
        ra.define_value_gpr(inst, reg);
    }

    /// Capture all four guest flags from the host flags into a packed
    /// guest-layout NZCV word. `carry_cc` differs between add (`B`)
    /// and sub (`AE`, since the guest carry is the complement of the
    /// host borrow).
    fn capture_nzcv(&mut self, ra: &mut RegAlloc, inst: InstIndex, carry_cc: Cc) {
        let n = ra.scratch_gpr(&mut self.code);
        let z = ra.scratch_gpr(&mut self.code);
        let c = ra.scratch_gpr(&mut self.code);
        let v = ra.scratch_gpr(&mut self.code);
        let code = &mut self.code;
        emit_setcc(code, Cc::S, n);
        emit_setcc(code, Cc::E, z);
        emit_setcc(code, carry_cc, c);
        emit_setcc(code, Cc::O, v);
        emit_movzx8(code, n, n);
        emit_movzx8(code, z, z);
        emit_movzx8(code, c, c);
        emit_movzx8(code, v, v);
        emit_shift_ri(code, ShiftOp::Shl, false, n, 31);
        emit_shift_ri(code, ShiftOp::Shl, false, z, 30);
        emit_shift_ri(code, ShiftOp::Shl, false, c, 29);
        emit_shift_ri(code, ShiftOp::Shl, false, v, 28);
        emit_arith_rr(code, ArithOp::Or, false, n, z);
        emit_arith_rr(code, ArithOp::Or, false, n, c);
        emit_arith_rr(code, ArithOp::Or, false, n, v);
        ra.define_value_gpr(inst, n);
    }

    // -- Add / subtract --

    pub(super) fn emit_add(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let cmp = companions(block, idx);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);

        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let b_imm = args[1].fits_in_imm_s32().then(|| args[1].imm_u64() as i32);
        let b_reg = if b_imm.is_none() {
            Some(ra.use_gpr(&mut self.code, &mut args[1]))
        } else {
            None
        };

        let carry_in_imm = args[2].is_immediate().then(|| args[2].imm_u1());
        let carry_in_reg = if carry_in_imm.is_none() {
            Some(ra.use_gpr(&mut self.code, &mut args[2]))
        } else {
            None
        };

        let code = &mut self.code;
        let op = match carry_in_imm {
            Some(false) => ArithOp::Add,
            Some(true) => {
                emit_stc(code);
                ArithOp::Adc
            }
            None => {
                emit_bt_ri(code, false, carry_in_reg.unwrap(), 0);
                ArithOp::Adc
            }
        };
        match (b_imm, b_reg) {
            (Some(imm), _) => emit_arith_ri(code, op, rexw, result, imm),
            (None, Some(reg)) => emit_arith_rr(code, op, rexw, result, reg),
            _ => unreachable!(),
        }

        if let Some(c) = cmp.carry {
            self.capture_flag(ra, c, Cc::B);
        }
        if let Some(o) = cmp.overflow {
            self.capture_flag(ra, o, Cc::O);
        }
        if let Some(nzcv) = cmp.nzcv {
            self.capture_nzcv(ra, nzcv, Cc::B);
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_sub(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let cmp = companions(block, idx);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);

        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let b_imm = args[1].fits_in_imm_s32().then(|| args[1].imm_u64() as i32);
        let b_reg = if b_imm.is_none() {
            Some(ra.use_gpr(&mut self.code, &mut args[1]))
        } else {
            None
        };

        let carry_in_imm = args[2].is_immediate().then(|| args[2].imm_u1());
        let carry_in_reg = if carry_in_imm.is_none() {
            Some(ra.use_gpr(&mut self.code, &mut args[2]))
        } else {
            None
        };

        let code = &mut self.code;
        // Guest carry-in 1 means "no borrow"; x86 SBB subtracts CF.
        let op = match carry_in_imm {
            Some(true) => ArithOp::Sub,
            Some(false) => {
                emit_stc(code);
                ArithOp::Sbb
            }
            None => {
                emit_bt_ri(code, false, carry_in_reg.unwrap(), 0);
                emit_cmc(code);
                ArithOp::Sbb
            }
        };
        match (b_imm, b_reg) {
            (Some(imm), _) => emit_arith_ri(code, op, rexw, result, imm),
            (None, Some(reg)) => emit_arith_rr(code, op, rexw, result, reg),
            _ => unreachable!(),
        }

        if let Some(c) = cmp.carry {
            // Guest carry is the complement of the host borrow.
            self.capture_flag(ra, c, Cc::Ae);
        }
        if let Some(o) = cmp.overflow {
            self.capture_flag(ra, o, Cc::O);
        }
        if let Some(nzcv) = cmp.nzcv {
            self.capture_nzcv(ra, nzcv, Cc::Ae);
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_mul(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let b = ra.use_gpr(&mut self.code, &mut args[1]);
        emit_imul_rr(&mut self.code, rexw, result, b);
        ra.define_value_gpr(idx, result);
    }

    /// ARM division: divide-by-zero yields zero; INT_MIN / -1 yields
    /// INT_MIN rather than trapping.
    pub(super) fn emit_div32(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, signed: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        ra.scratch_at(&mut self.code, HostLoc::Gpr(Gpr::Rax));
        ra.scratch_at(&mut self.code, HostLoc::Gpr(Gpr::Rdx));
        let a = ra.use_gpr(&mut self.code, &mut args[0]);
        let b = ra.use_gpr(&mut self.code, &mut args[1]);

        let code = &mut self.code;
        emit_mov_rr(code, false, Gpr::Rax, a);
        emit_test_rr(code, false, b, b);
        let zero = emit_jcc_forward(code, Cc::E);
        let done;
        if signed {
            emit_arith_ri(code, ArithOp::Cmp, false, b, -1);
            let div = emit_jcc_forward(code, Cc::Ne);
            // a / -1 == -a, including the INT_MIN wraparound.
            emit_neg(code, false, Gpr::Rax);
            done = emit_jmp_forward(code);
            resolve_forward(code, div);
            emit_cdq(code);
            emit_idiv(code, false, b);
        } else {
            emit_mov_ri(code, false, Gpr::Rdx, 0);
            emit_div(code, false, b);
            done = emit_jmp_forward(code);
        }
        let done2 = if signed {
            Some(emit_jmp_forward(code))
        } else {
            None
        };
        resolve_forward(code, zero);
        emit_mov_ri(code, false, Gpr::Rax, 0);
        resolve_forward(code, done);
        if let Some(j) = done2 {
            resolve_forward(code, j);
        }
        ra.define_value_gpr(idx, Gpr::Rax);
    }

    // -- Logical --

    pub(super) fn emit_logical(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
        op: ArithOp,
        rexw: bool,
    ) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        if args[1].fits_in_imm_s32() {
            emit_arith_ri(&mut self.code, op, rexw, result, args[1].imm_u64() as i32);
        } else {
            let b = ra.use_gpr(&mut self.code, &mut args[1]);
            emit_arith_rr(&mut self.code, op, rexw, result, b);
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_not(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        emit_not(&mut self.code, rexw, result);
        if !rexw {
            // Keep the upper half clear.
            emit_mov_rr(&mut self.code, false, result, result);
        }
        ra.define_value_gpr(idx, result);
    }

    // -- 32-bit shifts with ARM semantics --

    pub(super) fn emit_shift32(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
        kind: ShiftKind,
    ) {
        let inst = block.inst(idx);
        if inst.arg(1).is_immediate() {
            self.emit_shift32_imm(ra, block, idx, kind);
        } else {
            self.emit_shift32_reg(ra, block, idx, kind);
        }
    }

    fn emit_shift32_imm(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, kind: ShiftKind) {
        let cmp = companions(block, idx);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let amount = args[1].imm_u8();

        if amount == 0 {
            // Result and carry-out pass straight through.
            if let Some(c) = cmp.carry {
                ra.define_value_from_arg(&mut self.code, c, &mut args[2]);
            }
            ra.define_value_from_arg(&mut self.code, idx, &mut args[0]);
            return;
        }

        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        match (kind, amount) {
            (ShiftKind::Lsl, 1..=31) => {
                emit_shift_ri(&mut self.code, ShiftOp::Shl, false, result, amount);
                if let Some(c) = cmp.carry {
                    self.capture_flag(ra, c, Cc::B);
                }
            }
            (ShiftKind::Lsr, 1..=31) => {
                emit_shift_ri(&mut self.code, ShiftOp::Shr, false, result, amount);
                if let Some(c) = cmp.carry {
                    self.capture_flag(ra, c, Cc::B);
                }
            }
            (ShiftKind::Lsr, 32) => {
                if let Some(c) = cmp.carry {
                    emit_bt_ri(&mut self.code, false, result, 31);
                    self.capture_flag(ra, c, Cc::B);
                }
                emit_mov_ri(&mut self.code, false, result, 0);
            }
            (ShiftKind::Asr, 1..=31) => {
                emit_shift_ri(&mut self.code, ShiftOp::Sar, false, result, amount);
                if let Some(c) = cmp.carry {
                    self.capture_flag(ra, c, Cc::B);
                }
            }
            (ShiftKind::Asr, _) => {
                // ASR #32: every bit becomes the sign bit.
                if let Some(c) = cmp.carry {
                    emit_bt_ri(&mut self.code, false, result, 31);
                    self.capture_flag(ra, c, Cc::B);
                }
                emit_shift_ri(&mut self.code, ShiftOp::Sar, false, result, 31);
            }
            (ShiftKind::Ror, _) => {
                let amount = amount % 32;
                emit_shift_ri(&mut self.code, ShiftOp::Ror, false, result, amount);
                if let Some(c) = cmp.carry {
                    emit_bt_ri(&mut self.code, false, result, 31);
                    self.capture_flag(ra, c, Cc::B);
                }
            }
            (ShiftKind::Lsl, _) => {
                // LSL #32+: zero; carry is bit 0 for exactly 32.
                if let Some(c) = cmp.carry {
                    if amount == 32 {
                        emit_bt_ri(&mut self.code, false, result, 0);
                        self.capture_flag(ra, c, Cc::B);
                    } else {
                        let reg = ra.scratch_gpr(&mut self.code);
                        emit_mov_ri(&mut self.code, false, reg, 0);
                        ra.define_value_gpr(c, reg);
                    }
                }
                emit_mov_ri(&mut self.code, false, result, 0);
            }
            (ShiftKind::Lsr, _) => {
                // LSR #33+: zero result, zero carry.
                if let Some(c) = cmp.carry {
                    let reg = ra.scratch_gpr(&mut self.code);
                    emit_mov_ri(&mut self.code, false, reg, 0);
                    ra.define_value_gpr(c, reg);
                }
                emit_mov_ri(&mut self.code, false, result, 0);
            }
        }
        ra.define_value_gpr(idx, result);
    }

    /// Register-amount shifts (0..=255). Widened to 64 bits so the
    /// shifted-out bit can be recovered without branching on every
    /// amount; only amounts >= 64 need an explicit zero path.
    fn emit_shift32_reg(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, kind: ShiftKind) {
        let cmp = companions(block, idx);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);

        ra.use_scratch_at(&mut self.code, &mut args[1], HostLoc::Gpr(Gpr::Rcx));
        // A U8 amount may alias a wider register; only CL is defined.
        emit_movzx8(&mut self.code, Gpr::Rcx, Gpr::Rcx);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);

        match kind {
            ShiftKind::Ror => {
                // x86 masks the amount to 0..31, which matches the
                // result for every ARM amount.
                emit_shift_cl(&mut self.code, ShiftOp::Ror, false, result);
                if let Some(c) = cmp.carry {
                    let carry_in = ra.use_gpr(&mut self.code, &mut args[2]);
                    let carry = ra.scratch_gpr(&mut self.code);
                    let code = &mut self.code;
                    emit_bt_ri(code, false, result, 31);
                    emit_setcc(code, Cc::B, carry);
                    emit_movzx8(code, carry, carry);
                    // Amount 0 keeps the carry-in.
                    emit_test_ri(code, false, Gpr::Rcx, 0xFF);
                    emit_cmovcc(code, Cc::E, false, carry, carry_in);
                    ra.define_value_gpr(c, carry);
                }
            }
            ShiftKind::Lsl => {
                let code = &mut self.code;
                emit_mov_rr(code, false, result, result);
                emit_arith_ri(code, ArithOp::Cmp, false, Gpr::Rcx, 64);
                let huge = emit_jcc_forward(code, Cc::Ae);
                emit_shift_cl(code, ShiftOp::Shl, true, result);
                let done = emit_jmp_forward(code);
                resolve_forward(code, huge);
                emit_mov_ri(code, true, result, 0);
                resolve_forward(code, done);
                if let Some(c) = cmp.carry {
                    let carry_in = ra.use_gpr(&mut self.code, &mut args[2]);
                    let carry = ra.scratch_gpr(&mut self.code);
                    let code = &mut self.code;
                    emit_bt_ri(code, true, result, 32);
                    emit_setcc(code, Cc::B, carry);
                    emit_movzx8(code, carry, carry);
                    emit_test_ri(code, false, Gpr::Rcx, 0xFF);
                    emit_cmovcc(code, Cc::E, false, carry, carry_in);
                    ra.define_value_gpr(c, carry);
                }
                emit_mov_rr(&mut self.code, false, result, result);
            }
            ShiftKind::Lsr => {
                let code = &mut self.code;
                emit_mov_rr(code, false, result, result);
                emit_shift_ri(code, ShiftOp::Shl, true, result, 32);
                emit_arith_ri(code, ArithOp::Cmp, false, Gpr::Rcx, 64);
                let huge = emit_jcc_forward(code, Cc::Ae);
                emit_shift_cl(code, ShiftOp::Shr, true, result);
                let done = emit_jmp_forward(code);
                resolve_forward(code, huge);
                emit_mov_ri(code, true, result, 0);
                resolve_forward(code, done);
                if let Some(c) = cmp.carry {
                    let carry_in = ra.use_gpr(&mut self.code, &mut args[2]);
                    let carry = ra.scratch_gpr(&mut self.code);
                    let code = &mut self.code;
                    emit_bt_ri(code, true, result, 31);
                    emit_setcc(code, Cc::B, carry);
                    emit_movzx8(code, carry, carry);
                    emit_test_ri(code, false, Gpr::Rcx, 0xFF);
                    emit_cmovcc(code, Cc::E, false, carry, carry_in);
                    ra.define_value_gpr(c, carry);
                }
                emit_shift_ri(&mut self.code, ShiftOp::Shr, true, result, 32);
            }
            ShiftKind::Asr => {
                let code = &mut self.code;
                emit_movsxd(code, result, result);
                emit_shift_ri(code, ShiftOp::Shl, true, result, 32);
                // Clamp to 63: amounts past the width keep the sign.
                emit_arith_ri(code, ArithOp::Cmp, false, Gpr::Rcx, 63);
                let ok = emit_jcc_forward(code, Cc::Be);
                emit_mov_ri(code, false, Gpr::Rcx, 63);
                resolve_forward(code, ok);
                emit_shift_cl(code, ShiftOp::Sar, true, result);
                if let Some(c) = cmp.carry {
                    let carry_in = ra.use_gpr(&mut self.code, &mut args[2]);
                    let carry = ra.scratch_gpr(&mut self.code);
                    let code = &mut self.code;
                    emit_bt_ri(code, true, result, 31);
                    emit_setcc(code, Cc::B, carry);
                    emit_movzx8(code, carry, carry);
                    emit_test_ri(code, false, Gpr::Rcx, 0xFF);
                    emit_cmovcc(code, Cc::E, false, carry, carry_in);
                    ra.define_value_gpr(c, carry);
                }
                let code = &mut self.code;
                emit_shift_ri(code, ShiftOp::Sar, true, result, 32);
                emit_mov_rr(code, false, result, result);
            }
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_rotate_right_extended(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
    ) {
        let cmp = companions(block, idx);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);

        if args[1].is_immediate() {
            if args[1].imm_u1() {
                emit_stc(&mut self.code);
            } else {
                emit_clc(&mut self.code);
            }
        } else {
            let carry_in = ra.use_gpr(&mut self.code, &mut args[1]);
            emit_bt_ri(&mut self.code, false, carry_in, 0);
        }
        emit_shift_ri(&mut self.code, ShiftOp::Rcr, false, result, 1);
        if let Some(c) = cmp.carry {
            self.capture_flag(ra, c, Cc::B);
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_shift64(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
        op: ShiftOp,
    ) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let amount = args[1].imm_u8();
        if amount != 0 {
            emit_shift_ri(&mut self.code, op, true, result, amount & 63);
        }
        ra.define_value_gpr(idx, result);
    }

    // -- Extension / packing --

    pub(super) fn emit_extend(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
        kind: Extend,
    ) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let code = &mut self.code;
        match kind {
            Extend::S8To32 => emit_movsx8(code, false, result, result),
            Extend::S16To32 => emit_movsx16(code, false, result, result),
            Extend::S32To64 => emit_movsxd(code, result, result),
            Extend::Z8To32 => emit_movzx8(code, result, result),
            Extend::Z16To32 => emit_movzx16(code, result, result),
            Extend::Z32To64 => emit_mov_rr(code, false, result, result),
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_pack_2x32(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[1]);
        let lo = ra.use_gpr(&mut self.code, &mut args[0]);
        let code = &mut self.code;
        emit_shift_ri(code, ShiftOp::Shl, true, result, 32);
        // The low operand's upper half is already clear.
        let scratch = ra.scratch_gpr(code);
        emit_mov_rr(code, false, scratch, lo);
        emit_arith_rr(code, ArithOp::Or, true, result, scratch);
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_least_significant_word(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        emit_mov_rr(&mut self.code, false, result, result);
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_most_significant_word(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        emit_shift_ri(&mut self.code, ShiftOp::Shr, true, result, 32);
        ra.define_value_gpr(idx, result);
    }

    /// U16/U8 narrowing is a no-op at the register level; consumers
    /// only look at the low bits.
    pub(super) fn emit_least_significant_narrow(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        ra.define_value_from_arg(&mut self.code, idx, &mut args[0]);
    }

    pub(super) fn emit_most_significant_bit(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let width = inst.arg(0).ty();
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        let bit = if width == Type::U64 { 63 } else { 31 };
        emit_shift_ri(&mut self.code, ShiftOp::Shr, bit == 63, result, bit);
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_is_zero(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        let result = ra.scratch_gpr(&mut self.code);
        emit_test_rr(&mut self.code, rexw, value, value);
        emit_setcc(&mut self.code, Cc::E, result);
        emit_movzx8(&mut self.code, result, result);
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_test_bit(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let bit = inst.arg(1).imm_u8();
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        let result = ra.scratch_gpr(&mut self.code);
        emit_bt_ri(&mut self.code, false, value, bit);
        emit_setcc(&mut self.code, Cc::B, result);
        emit_movzx8(&mut self.code, result, result);
        ra.define_value_gpr(idx, result);
    }

    // -- Byte reversal / CLZ --

    pub(super) fn emit_byte_reverse(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bits: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        match bits {
            16 => {
                // rev16 on a halfword: swap the two low bytes.
                emit_shift_ri(&mut self.code, ShiftOp::Rol, false, result, 16);
                emit_bswap(&mut self.code, false, result);
            }
            32 => emit_bswap(&mut self.code, false, result),
            _ => emit_bswap(&mut self.code, true, result),
        }
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_clz(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, rexw: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        let result = ra.scratch_gpr(&mut self.code);
        if self.code.host_features().contains(HostFeature::LZCNT) {
            emit_lzcnt(&mut self.code, rexw, result, value);
        } else {
            // BSR leaves the destination undefined for zero input.
            let scratch = ra.scratch_gpr(&mut self.code);
            let code = &mut self.code;
            let all = if rexw { 127 } else { 63 };
            let xor = if rexw { 63 } else { 31 };
            emit_bsr(code, rexw, result, value);
            emit_mov_ri(code, false, scratch, all);
            emit_cmovcc(code, Cc::E, rexw, result, scratch);
            emit_arith_ri(code, ArithOp::Xor, false, result, xor as i32);
        }
        ra.define_value_gpr(idx, result);
    }

    // -- Conditional select --

    /// Evaluate `cond` against the stored guest NZCV and return the
    /// host condition under which it passes. Needs two scratch
    /// registers for the compound conditions.
    fn emit_cond_to_cc(&mut self, cond: Cond, s: Gpr, t: Gpr) -> Cc {
        let code = &mut self.code;
        let nzcv_off = crate::jitstate::offset_cpsr_nzcv();
        const N: u32 = 1 << 31;
        const Z: u32 = 1 << 30;
        const C: u32 = 1 << 29;
        const V: u32 = 1 << 28;
        match cond {
            Cond::EQ | Cond::NE => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, Z);
                if cond == Cond::EQ {
                    Cc::Ne
                } else {
                    Cc::E
                }
            }
            Cond::CS | Cond::CC => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, C);
                if cond == Cond::CS {
                    Cc::Ne
                } else {
                    Cc::E
                }
            }
            Cond::MI | Cond::PL => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, N);
                if cond == Cond::MI {
                    Cc::Ne
                } else {
                    Cc::E
                }
            }
            Cond::VS | Cond::VC => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, V);
                if cond == Cond::VS {
                    Cc::Ne
                } else {
                    Cc::E
                }
            }
            Cond::HI | Cond::LS => {
                emit_load(code, false, s, Gpr::R15, nzcv_off);
                emit_arith_ri(code, ArithOp::And, false, s, (C | Z) as i32);
                emit_arith_ri(code, ArithOp::Cmp, false, s, C as i32);
                if cond == Cond::HI {
                    Cc::E
                } else {
                    Cc::Ne
                }
            }
            Cond::GE | Cond::LT => {
                emit_load(code, false, s, Gpr::R15, nzcv_off);
                emit_mov_rr(code, false, t, s);
                emit_shift_ri(code, ShiftOp::Shr, false, t, 3);
                emit_arith_rr(code, ArithOp::Xor, false, s, t);
                emit_test_ri(code, false, s, V);
                if cond == Cond::GE {
                    Cc::E
                } else {
                    Cc::Ne
                }
            }
            Cond::GT | Cond::LE => {
                emit_load(code, false, s, Gpr::R15, nzcv_off);
                emit_mov_rr(code, false, t, s);
                emit_shift_ri(code, ShiftOp::Shr, false, t, 3);
                emit_arith_rr(code, ArithOp::Xor, false, t, s);
                emit_arith_ri(code, ArithOp::And, false, t, V as i32);
                emit_arith_ri(code, ArithOp::And, false, s, Z as i32);
                emit_arith_rr(code, ArithOp::Or, false, t, s);
                if cond == Cond::GT {
                    Cc::E
                } else {
                    Cc::Ne
                }
            }
            Cond::AL | Cond::NV => panic!("AL/NV must be folded by the translator"),
        }
    }

    pub(super) fn emit_conditional_select(
        &mut self,
        ra: &mut RegAlloc,
        block: &Block,
        idx: InstIndex,
        rexw: bool,
    ) {
        let inst = block.inst(idx);
        let cond = inst.arg(0).imm_cond();
        let mut args = ra.get_argument_info(inst);
        // Result starts as the else-value; conditionally replaced.
        let result = ra.use_scratch_gpr(&mut self.code, &mut args[2]);
        let then_ = ra.use_gpr(&mut self.code, &mut args[1]);
        let s = ra.scratch_gpr(&mut self.code);
        let t = ra.scratch_gpr(&mut self.code);
        if cond == Cond::AL || cond == Cond::NV {
            emit_mov_rr(&mut self.code, rexw, result, then_);
        } else {
            let cc = self.emit_cond_to_cc(cond, s, t);
            emit_cmovcc(&mut self.code, cc, rexw, result, then_);
        }
        ra.define_value_gpr(idx, result);
    }

    // -- GPR <-> XMM transfers --

    pub(super) fn emit_transfer_to_fp(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, wide: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        let result = ra.scratch_xmm(&mut self.code);
        emit_movd_to_xmm(&mut self.code, wide, result, value);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_transfer_from_fp(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, wide: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_xmm(&mut self.code, &mut args[0]);
        let result = ra.scratch_gpr(&mut self.code);
        emit_movd_from_xmm(&mut self.code, wide, result, value);
        ra.define_value_gpr(idx, result);
    }
}
