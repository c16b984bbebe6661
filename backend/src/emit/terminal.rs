//! Terminal emitters and the return stack buffer.
//!
//! Terminals run after the last allocation scope has closed, so RAX,
//! RCX and RDX are freely clobberable here.

use dbt_ir::block::{Block, InstIndex, Terminal};
use dbt_ir::LocationDescriptor;

use crate::encoder::*;
use crate::hostloc::{Gpr, HostLoc};
use crate::jitstate;
use crate::reg_alloc::RegAlloc;

use super::EmitX64;

impl EmitX64 {
    pub(crate) fn emit_terminal(&mut self, terminal: &Terminal, initial_location: LocationDescriptor) {
        match terminal {
            Terminal::Invalid => panic!("invalid terminal reached emission"),
            Terminal::Interpret(location) => {
                self.emit_write_pc(*location);
                let thunk = self.thunks().interpret as usize;
                let ctx = self.ctx() as u64;
                emit_mov_ri(&mut self.code, true, Gpr::Rdi, ctx);
                self.code.call_function(thunk);
                let dispatch = self.code.return_from_run_code();
                emit_jmp_to(&mut self.code, dispatch);
            }
            Terminal::ReturnToDispatch => {
                let dispatch = self.code.return_from_run_code();
                emit_jmp_to(&mut self.code, dispatch);
            }
            Terminal::LinkBlock(location) => {
                // Chain only while cycles remain; otherwise store the
                // PC and let the dispatcher decide.
                emit_arith_mi(
                    &mut self.code,
                    ArithOp::Cmp,
                    true,
                    Gpr::R15,
                    jitstate::offset_cycles_remaining(),
                    0,
                );
                self.emit_patch_jg(*location);
                self.emit_write_pc(*location);
                let dispatch = self.code.return_from_run_code();
                emit_jmp_to(&mut self.code, dispatch);
            }
            Terminal::LinkBlockFast(location) => {
                self.emit_patch_jmp(*location);
            }
            Terminal::PopRSBHint => {
                self.emit_pop_rsb_hint(initial_location);
            }
            Terminal::If { cond, then_, else_ } => {
                let taken = self.emit_cond_jump(*cond);
                self.emit_terminal(else_, initial_location);
                resolve_forward(&mut self.code, taken);
                self.emit_terminal(then_, initial_location);
            }
            Terminal::CheckHalt(else_) => {
                emit_test_mi32(
                    &mut self.code,
                    Gpr::R15,
                    jitstate::offset_halt_requested(),
                    u32::MAX,
                );
                let dispatch = self.code.return_from_run_code();
                emit_jcc_to(&mut self.code, Cc::Ne, dispatch);
                self.emit_terminal(else_, initial_location);
            }
            Terminal::CheckBit { then_, else_ } => {
                emit_test_mi8(&mut self.code, Gpr::R15, jitstate::offset_check_bit(), 1);
                let clear = emit_jcc_forward(&mut self.code, Cc::E);
                self.emit_terminal(then_, initial_location);
                resolve_forward(&mut self.code, clear);
                self.emit_terminal(else_, initial_location);
            }
        }
    }

    /// RSB probe: if the top entry's hash matches the current guest
    /// location, pop it and branch straight to its host code;
    /// otherwise fall into the dispatcher.
    fn emit_pop_rsb_hint(&mut self, initial_location: LocationDescriptor) {
        let code = &mut self.code;

        // rbx <- current location hash (upper bits | PC).
        emit_load(
            code,
            true,
            Gpr::Rbx,
            Gpr::R15,
            jitstate::offset_upper_location_descriptor(),
        );
        if initial_location.is_a64() {
            emit_load(code, true, Gpr::Rax, Gpr::R15, jitstate::offset_pc64());
        } else {
            emit_load(code, false, Gpr::Rax, Gpr::R15, jitstate::offset_regs(15));
        }
        emit_arith_rr(code, ArithOp::Or, true, Gpr::Rbx, Gpr::Rax);

        emit_load(code, false, Gpr::Rcx, Gpr::R15, jitstate::offset_rsb_ptr());
        emit_shift_ri(code, ShiftOp::Shl, false, Gpr::Rcx, 3);
        emit_cmp_rm_sib(
            code,
            true,
            Gpr::Rbx,
            Gpr::R15,
            Gpr::Rcx,
            jitstate::offset_rsb_location_descriptors(),
        );
        let miss = emit_jcc_forward(code, Cc::Ne);

        emit_load_sib(
            code,
            true,
            Gpr::Rax,
            Gpr::R15,
            Gpr::Rcx,
            jitstate::offset_rsb_codeptrs(),
        );
        // Pop the consumed entry.
        emit_shift_ri(code, ShiftOp::Shr, false, Gpr::Rcx, 3);
        emit_arith_ri(code, ArithOp::Sub, false, Gpr::Rcx, 1);
        emit_arith_ri(
            code,
            ArithOp::And,
            false,
            Gpr::Rcx,
            (jitstate::RSB_ENTRIES - 1) as i32,
        );
        emit_store(code, false, Gpr::Rcx, Gpr::R15, jitstate::offset_rsb_ptr());
        emit_jmp_reg(code, Gpr::Rax);

        resolve_forward(code, miss);
        let dispatch = code.return_from_run_code();
        emit_jmp_to(code, dispatch);
    }

    /// `PushRSB`: advance the ring and record (hash, host code ptr) for
    /// the return location. The code pointer is a patchable
    /// `mov rcx, imm64` that tracks the target block's entrypoint.
    pub(super) fn emit_push_rsb(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let hash = inst.arg(0).imm_u64();
        let target = LocationDescriptor::from_raw(hash);

        ra.scratch_at(&mut self.code, HostLoc::Gpr(Gpr::Rcx));
        let index = ra.scratch_gpr(&mut self.code);
        let tmp = ra.scratch_gpr(&mut self.code);

        let code = &mut self.code;
        emit_load(code, false, index, Gpr::R15, jitstate::offset_rsb_ptr());
        emit_arith_ri(code, ArithOp::Add, false, index, 1);
        emit_arith_ri(
            code,
            ArithOp::And,
            false,
            index,
            (jitstate::RSB_ENTRIES - 1) as i32,
        );
        emit_store(code, false, index, Gpr::R15, jitstate::offset_rsb_ptr());
        emit_shift_ri(code, ShiftOp::Shl, false, index, 3);

        emit_mov_ri(code, true, tmp, hash);
        emit_store_sib(
            code,
            true,
            tmp,
            Gpr::R15,
            index,
            jitstate::offset_rsb_location_descriptors(),
        );

        self.emit_patch_mov_rcx(target);
        emit_store_sib(
            &mut self.code,
            true,
            Gpr::Rcx,
            Gpr::R15,
            index,
            jitstate::offset_rsb_codeptrs(),
        );
    }
}
