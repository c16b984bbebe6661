//! Guest memory access, supervisor calls and exception delivery.
//!
//! With a guest page table configured, 32-bit addressed accesses get an
//! inline fast path (`page_table[vaddr >> 12] + (vaddr & 0xFFF)`) whose
//! miss branch lives in far code and calls the embedder callback; a
//! null page entry forces the callback. Without a page table every
//! access is a host call.

use dbt_ir::block::{Block, InstIndex};
use dbt_ir::types::Type;

use crate::encoder::*;
use crate::hostloc::{Gpr, HostLoc, Xmm};
use crate::jitstate;
use crate::reg_alloc::RegAlloc;

use super::EmitX64;

/// Callee-saved registers usable as fast-path results: the far-code
/// slow path saves and restores every caller-saved register around the
/// callback, so the result must live elsewhere.
const CALLEE_SAVED_RESULT: &[HostLoc] = &[
    HostLoc::Gpr(Gpr::Rbx),
    HostLoc::Gpr(Gpr::Rbp),
    HostLoc::Gpr(Gpr::R12),
    HostLoc::Gpr(Gpr::R13),
    HostLoc::Gpr(Gpr::R14),
];

const CALLER_SAVED_GPRS: [Gpr; 9] = [
    Gpr::Rax,
    Gpr::Rcx,
    Gpr::Rdx,
    Gpr::Rsi,
    Gpr::Rdi,
    Gpr::R8,
    Gpr::R9,
    Gpr::R10,
    Gpr::R11,
];

impl EmitX64 {
    fn read_thunk(&self, bits: u32) -> usize {
        let t = self.thunks();
        (match bits {
            8 => t.read8,
            16 => t.read16,
            32 => t.read32,
            _ => t.read64,
        }) as usize
    }

    fn write_thunk(&self, bits: u32) -> usize {
        let t = self.thunks();
        (match bits {
            8 => t.write8,
            16 => t.write16,
            32 => t.write32,
            _ => t.write64,
        }) as usize
    }

    pub(super) fn emit_read_memory(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bits: u32) {
        let inst = block.inst(idx);
        let addr_is_32 = inst.arg(0).ty() == Type::U32;
        if self.has_page_table() && addr_is_32 {
            self.emit_read_memory_fast(ra, block, idx, bits);
        } else {
            let mut args = ra.get_argument_info(inst);
            let thunk = self.read_thunk(bits);
            ra.host_call(&mut self.code, Some(idx), [None, Some(&mut args[0]), None, None]);
            let ctx = self.ctx() as u64;
            emit_mov_ri(&mut self.code, true, Gpr::Rdi, ctx);
            self.code.call_function(thunk);
        }
    }

    pub(super) fn emit_write_memory(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bits: u32) {
        let inst = block.inst(idx);
        let addr_is_32 = inst.arg(0).ty() == Type::U32;
        if self.has_page_table() && addr_is_32 {
            self.emit_write_memory_fast(ra, block, idx, bits);
        } else {
            let mut args = ra.get_argument_info(inst);
            let thunk = self.write_thunk(bits);
            let (addr, value) = args.split_at_mut(1);
            ra.host_call(
                &mut self.code,
                None,
                [None, Some(&mut addr[0]), Some(&mut value[0]), None],
            );
            let ctx = self.ctx() as u64;
            emit_mov_ri(&mut self.code, true, Gpr::Rdi, ctx);
            self.code.call_function(thunk);
        }
    }

    fn emit_read_memory_fast(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bits: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let addr = ra.use_gpr(&mut self.code, &mut args[0]);
        let page = ra.scratch_gpr(&mut self.code);
        let offset = ra.scratch_gpr(&mut self.code);
        let result = ra.scratch_gpr_from(&mut self.code, CALLEE_SAVED_RESULT);
        let thunk = self.read_thunk(bits);
        let ctx = self.ctx() as u64;

        let code = &mut self.code;
        emit_load(code, true, page, Gpr::R15, jitstate::offset_page_table());
        emit_mov_rr(code, false, offset, addr);
        emit_shift_ri(code, ShiftOp::Shr, false, offset, 12);
        emit_shift_ri(code, ShiftOp::Shl, true, offset, 3);
        emit_load_sib(code, true, page, page, offset, 0);
        emit_test_rr(code, true, page, page);
        let slow = emit_jcc_forward(code, Cc::E);
        emit_mov_rr(code, false, offset, addr);
        emit_arith_ri(code, ArithOp::And, false, offset, 0xFFF);
        match bits {
            8 => emit_load_zx8_sib(code, result, page, offset, 0),
            16 => emit_load_zx16_sib(code, result, page, offset, 0),
            32 => emit_load_sib(code, false, result, page, offset, 0),
            _ => emit_load_sib(code, true, result, page, offset, 0),
        }
        let done = emit_jmp_forward(code);

        code.switch_to_far_code();
        resolve_forward(code, slow);
        emit_push(code, addr);
        for reg in CALLER_SAVED_GPRS {
            emit_push(code, reg);
        }
        emit_arith_ri(code, ArithOp::Sub, true, Gpr::Rsp, 256);
        for i in 0..16 {
            emit_movups_store(code, Xmm::from_index(i), Gpr::Rsp, (i * 16) as i32);
        }
        emit_load(code, true, Gpr::Rsi, Gpr::Rsp, 256 + 72);
        emit_mov_ri(code, true, Gpr::Rdi, ctx);
        emit_mov_ri(code, true, Gpr::Rax, thunk as u64);
        emit_call_reg(code, Gpr::Rax);
        emit_mov_rr(code, true, result, Gpr::Rax);
        for i in 0..16 {
            emit_movups_load(code, Xmm::from_index(i), Gpr::Rsp, (i * 16) as i32);
        }
        emit_arith_ri(code, ArithOp::Add, true, Gpr::Rsp, 256);
        for reg in CALLER_SAVED_GPRS.iter().rev() {
            emit_pop(code, *reg);
        }
        emit_arith_ri(code, ArithOp::Add, true, Gpr::Rsp, 8);
        let back = emit_jmp_forward(code);
        code.switch_to_near_code();
        resolve_forward(code, done);
        resolve_forward(code, back);

        ra.define_value_gpr(idx, result);
    }

    fn emit_write_memory_fast(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, bits: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let addr = ra.use_gpr(&mut self.code, &mut args[0]);
        let value = ra.use_gpr(&mut self.code, &mut args[1]);
        let page = ra.scratch_gpr(&mut self.code);
        let offset = ra.scratch_gpr(&mut self.code);
        let thunk = self.write_thunk(bits);
        let ctx = self.ctx() as u64;

        let code = &mut self.code;
        emit_load(code, true, page, Gpr::R15, jitstate::offset_page_table());
        emit_mov_rr(code, false, offset, addr);
        emit_shift_ri(code, ShiftOp::Shr, false, offset, 12);
        emit_shift_ri(code, ShiftOp::Shl, true, offset, 3);
        emit_load_sib(code, true, page, page, offset, 0);
        emit_test_rr(code, true, page, page);
        let slow = emit_jcc_forward(code, Cc::E);
        emit_mov_rr(code, false, offset, addr);
        emit_arith_ri(code, ArithOp::And, false, offset, 0xFFF);
        match bits {
            8 => emit_store8_sib(code, value, page, offset, 0),
            16 => emit_store16_sib(code, value, page, offset, 0),
            32 => emit_store_sib(code, false, value, page, offset, 0),
            _ => emit_store_sib(code, true, value, page, offset, 0),
        }
        let done = emit_jmp_forward(code);

        code.switch_to_far_code();
        resolve_forward(code, slow);
        emit_push(code, addr);
        emit_push(code, value);
        for reg in CALLER_SAVED_GPRS {
            emit_push(code, reg);
        }
        // 11 pushes leave the stack 8 off; 264 restores alignment.
        emit_arith_ri(code, ArithOp::Sub, true, Gpr::Rsp, 264);
        for i in 0..16 {
            emit_movups_store(code, Xmm::from_index(i), Gpr::Rsp, (i * 16) as i32);
        }
        emit_load(code, true, Gpr::Rdx, Gpr::Rsp, 264 + 72);
        emit_load(code, true, Gpr::Rsi, Gpr::Rsp, 264 + 72 + 8);
        emit_mov_ri(code, true, Gpr::Rdi, ctx);
        emit_mov_ri(code, true, Gpr::Rax, thunk as u64);
        emit_call_reg(code, Gpr::Rax);
        for i in 0..16 {
            emit_movups_load(code, Xmm::from_index(i), Gpr::Rsp, (i * 16) as i32);
        }
        emit_arith_ri(code, ArithOp::Add, true, Gpr::Rsp, 264);
        for reg in CALLER_SAVED_GPRS.iter().rev() {
            emit_pop(code, *reg);
        }
        emit_arith_ri(code, ArithOp::Add, true, Gpr::Rsp, 16);
        let back = emit_jmp_forward(code);
        code.switch_to_near_code();
        resolve_forward(code, done);
        resolve_forward(code, back);
    }

    pub(super) fn emit_call_supervisor(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let thunk = self.thunks().call_svc as usize;
        ra.host_call(&mut self.code, None, [None, Some(&mut args[0]), None, None]);
        let ctx = self.ctx() as u64;
        emit_mov_ri(&mut self.code, true, Gpr::Rdi, ctx);
        self.code.call_function(thunk);
    }

    pub(super) fn emit_exception_raised(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let thunk = self.thunks().exception_raised as usize;
        ra.host_call(&mut self.code, None, [None, Some(&mut args[0]), None, None]);
        let ctx = self.ctx() as u64;
        emit_mov_ri(&mut self.code, true, Gpr::Rdi, ctx);
        self.code.call_function(thunk);
    }
}
