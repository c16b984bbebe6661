//! Guest-state opcodes: register file accesses, CPSR/flags, the A64
//! PC and the CheckBit scratch bit.

use dbt_ir::block::{Block, InstIndex};
use dbt_ir::types::A32ExtReg;

use crate::encoder::*;
use crate::hostloc::Gpr;
use crate::jitstate;
use crate::reg_alloc::RegAlloc;

use super::EmitX64;

const NZCV_N: u32 = 1 << 31;
const NZCV_Z: u32 = 1 << 30;
const NZCV_C: u32 = 1 << 29;
const NZCV_V: u32 = 1 << 28;

fn ext_single_offset(reg: A32ExtReg) -> i32 {
    match reg {
        A32ExtReg::S(i) => jitstate::offset_ext_regs(i as usize),
        _ => panic!("expected an S register"),
    }
}

fn ext_double_offset(reg: A32ExtReg) -> i32 {
    match reg {
        A32ExtReg::D(i) => jitstate::offset_ext_regs(2 * i as usize),
        _ => panic!("expected a D register"),
    }
}

fn ext_quad_offset(reg: A32ExtReg) -> i32 {
    match reg {
        A32ExtReg::Q(i) => jitstate::offset_ext_regs(4 * i as usize),
        _ => panic!("expected a Q register"),
    }
}

impl EmitX64 {
    pub(super) fn emit_a32_get_register(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a32_reg();
        let result = ra.scratch_gpr(&mut self.code);
        emit_load(
            &mut self.code,
            false,
            result,
            Gpr::R15,
            jitstate::offset_regs(reg.index()),
        );
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_a32_set_register(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a32_reg();
        let mut args = ra.get_argument_info(inst);
        let disp = jitstate::offset_regs(reg.index());
        if args[1].is_immediate() {
            emit_store_imm32(&mut self.code, false, Gpr::R15, disp, args[1].imm_u32());
        } else {
            let value = ra.use_gpr(&mut self.code, &mut args[1]);
            emit_store(&mut self.code, false, value, Gpr::R15, disp);
        }
    }

    pub(super) fn emit_a32_get_ext_reg32(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_single_offset(inst.arg(0).imm_a32_ext_reg());
        let result = ra.scratch_xmm(&mut self.code);
        emit_movss_load(&mut self.code, result, Gpr::R15, disp);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_a32_set_ext_reg32(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_single_offset(inst.arg(0).imm_a32_ext_reg());
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_movss_store(&mut self.code, value, Gpr::R15, disp);
    }

    pub(super) fn emit_a32_get_ext_reg64(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_double_offset(inst.arg(0).imm_a32_ext_reg());
        let result = ra.scratch_xmm(&mut self.code);
        emit_movsd_load(&mut self.code, result, Gpr::R15, disp);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_a32_set_ext_reg64(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_double_offset(inst.arg(0).imm_a32_ext_reg());
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_movsd_store(&mut self.code, value, Gpr::R15, disp);
    }

    pub(super) fn emit_a32_get_q(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_quad_offset(inst.arg(0).imm_a32_ext_reg());
        let result = ra.scratch_xmm(&mut self.code);
        emit_movups_load(&mut self.code, result, Gpr::R15, disp);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_a32_set_q(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let disp = ext_quad_offset(inst.arg(0).imm_a32_ext_reg());
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_movups_store(&mut self.code, value, Gpr::R15, disp);
    }

    pub(super) fn emit_a32_get_cpsr(&mut self, ra: &mut RegAlloc, _block: &Block, idx: InstIndex) {
        let result = ra.scratch_gpr(&mut self.code);
        emit_load(
            &mut self.code,
            false,
            result,
            Gpr::R15,
            jitstate::offset_cpsr_nzcv(),
        );
        emit_arith_rm(
            &mut self.code,
            ArithOp::Or,
            false,
            result,
            Gpr::R15,
            jitstate::offset_cpsr_jaifm(),
        );
        ra.define_value_gpr(idx, result);
    }

    /// Split the written word into the NZCV and remainder fields, and
    /// refresh the non-PC location-descriptor bits (ISA mode from T,
    /// data endianness from E) that the RSB probe depends on.
    pub(super) fn emit_a32_set_cpsr(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        let scratch = ra.scratch_gpr(&mut self.code);
        let upper = ra.scratch_gpr(&mut self.code);
        let tmp = ra.scratch_gpr(&mut self.code);
        let code = &mut self.code;

        emit_mov_rr(code, false, scratch, value);
        emit_arith_ri(code, ArithOp::And, false, scratch, 0xF000_0000u32 as i32);
        emit_store(code, false, scratch, Gpr::R15, jitstate::offset_cpsr_nzcv());

        emit_mov_rr(code, false, scratch, value);
        emit_arith_ri(code, ArithOp::And, false, scratch, 0x0FFF_FFFF);
        emit_store(code, false, scratch, Gpr::R15, jitstate::offset_cpsr_jaifm());

        // upper = (upper & ~(mode | E)) | T(bit 5) << 57 | E(bit 9) << 31.
        let upper_off = jitstate::offset_upper_location_descriptor();
        emit_load(code, true, upper, Gpr::R15, upper_off);
        emit_mov_ri(code, true, tmp, !((3u64 << 62) | (1u64 << 40)));
        emit_arith_rr(code, ArithOp::And, true, upper, tmp);
        emit_mov_rr(code, false, tmp, value);
        emit_arith_ri(code, ArithOp::And, false, tmp, 1 << 5);
        emit_shift_ri(code, ShiftOp::Shl, true, tmp, 57);
        emit_arith_rr(code, ArithOp::Or, true, upper, tmp);
        emit_mov_rr(code, false, tmp, value);
        emit_arith_ri(code, ArithOp::And, false, tmp, 1 << 9);
        emit_shift_ri(code, ShiftOp::Shl, true, tmp, 31);
        emit_arith_rr(code, ArithOp::Or, true, upper, tmp);
        emit_store(code, true, upper, Gpr::R15, upper_off);
    }

    pub(super) fn emit_get_c_flag(&mut self, ra: &mut RegAlloc, _block: &Block, idx: InstIndex) {
        let result = ra.scratch_gpr(&mut self.code);
        emit_bt_mi(&mut self.code, Gpr::R15, jitstate::offset_cpsr_nzcv(), 29);
        emit_setcc(&mut self.code, Cc::B, result);
        emit_movzx8(&mut self.code, result, result);
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_set_flag(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bit: u32) {
        debug_assert!(matches!(bit, 28..=31));
        let mask = 1u32 << bit;
        debug_assert!(mask & (NZCV_N | NZCV_Z | NZCV_C | NZCV_V) != 0);
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let nzcv_off = jitstate::offset_cpsr_nzcv();
        if args[0].is_immediate() {
            if args[0].imm_u1() {
                emit_arith_mi(&mut self.code, ArithOp::Or, false, Gpr::R15, nzcv_off, mask as i32);
            } else {
                emit_arith_mi(&mut self.code, ArithOp::And, false, Gpr::R15, nzcv_off, !mask as i32);
            }
            return;
        }
        let value = ra.use_scratch_gpr(&mut self.code, &mut args[0]);
        emit_shift_ri(&mut self.code, ShiftOp::Shl, false, value, bit as u8);
        emit_arith_mi(&mut self.code, ArithOp::And, false, Gpr::R15, nzcv_off, !mask as i32);
        emit_arith_mr(&mut self.code, ArithOp::Or, false, Gpr::R15, nzcv_off, value);
    }

    pub(super) fn emit_set_cpsr_nzcv(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        emit_store(
            &mut self.code,
            false,
            value,
            Gpr::R15,
            jitstate::offset_cpsr_nzcv(),
        );
    }

    // -- A64 --

    pub(super) fn emit_a64_get_w(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_reg();
        let result = ra.scratch_gpr(&mut self.code);
        emit_load(
            &mut self.code,
            false,
            result,
            Gpr::R15,
            jitstate::offset_x(reg.index()),
        );
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_a64_get_x(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_reg();
        let result = ra.scratch_gpr(&mut self.code);
        emit_load(
            &mut self.code,
            true,
            result,
            Gpr::R15,
            jitstate::offset_x(reg.index()),
        );
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_a64_set_w(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_reg();
        let mut args = ra.get_argument_info(inst);
        // A W write zeroes the upper half of the X register.
        let disp = jitstate::offset_x(reg.index());
        if args[1].is_immediate() {
            let scratch = ra.scratch_gpr(&mut self.code);
            emit_mov_ri(&mut self.code, false, scratch, u64::from(args[1].imm_u32()));
            emit_store(&mut self.code, true, scratch, Gpr::R15, disp);
        } else {
            let value = ra.use_scratch_gpr(&mut self.code, &mut args[1]);
            emit_mov_rr(&mut self.code, false, value, value);
            emit_store(&mut self.code, true, value, Gpr::R15, disp);
        }
    }

    pub(super) fn emit_a64_set_x(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_reg();
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[1]);
        emit_store(
            &mut self.code,
            true,
            value,
            Gpr::R15,
            jitstate::offset_x(reg.index()),
        );
    }

    pub(super) fn emit_a64_get_sp(&mut self, ra: &mut RegAlloc, _block: &Block, idx: InstIndex) {
        let result = ra.scratch_gpr(&mut self.code);
        emit_load(&mut self.code, true, result, Gpr::R15, jitstate::offset_sp());
        ra.define_value_gpr(idx, result);
    }

    pub(super) fn emit_a64_set_sp(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        emit_store(&mut self.code, true, value, Gpr::R15, jitstate::offset_sp());
    }

    pub(super) fn emit_a64_set_pc(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_gpr(&mut self.code, &mut args[0]);
        emit_store(&mut self.code, true, value, Gpr::R15, jitstate::offset_pc64());
    }

    pub(super) fn emit_a64_get_vector(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_vec();
        let result = ra.scratch_xmm(&mut self.code);
        emit_movups_load(
            &mut self.code,
            result,
            Gpr::R15,
            jitstate::offset_vec(reg.index()),
        );
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_a64_set_vector(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let reg = inst.arg(0).imm_a64_vec();
        let mut args = ra.get_argument_info(inst);
        let value = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_movups_store(
            &mut self.code,
            value,
            Gpr::R15,
            jitstate::offset_vec(reg.index()),
        );
    }

    pub(super) fn emit_set_check_bit(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let disp = jitstate::offset_check_bit();
        if args[0].is_immediate() {
            emit_store_imm8(&mut self.code, Gpr::R15, disp, u8::from(args[0].imm_u1()));
        } else {
            let value = ra.use_gpr(&mut self.code, &mut args[0]);
            emit_store8(&mut self.code, value, Gpr::R15, disp);
        }
    }
}
