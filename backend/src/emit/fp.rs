//! Scalar floating-point emitters.
//!
//! Rounding mode and denormal flushing follow the guest MXCSR image
//! installed by the run-code prologue (derived from the FPSCR), so the
//! fpscr-controlled opcodes need no per-instruction mode switching.

use dbt_ir::block::{Block, InstIndex};

use crate::encoder::*;
use crate::reg_alloc::RegAlloc;

use super::EmitX64;

impl EmitX64 {
    pub(super) fn emit_fp_binary(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, opc: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);
        let b = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_sse_rr(&mut self.code, opc, result, b);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_fp_abs(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, double: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);
        let mask = if double {
            self.code.mconst(0x7FFF_FFFF_FFFF_FFFF, 0x7FFF_FFFF_FFFF_FFFF)
        } else {
            self.code.mconst(0x7FFF_FFFF_7FFF_FFFF, 0x7FFF_FFFF_7FFF_FFFF)
        };
        emit_sse_rip(&mut self.code, OPC_ANDPS, result, mask);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_fp_neg(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, double: bool) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);
        let mask = if double {
            self.code.mconst(0x8000_0000_0000_0000, 0x8000_0000_0000_0000)
        } else {
            self.code.mconst(0x8000_0000_8000_0000, 0x8000_0000_8000_0000)
        };
        emit_sse_rip(&mut self.code, OPC_XORPS, result, mask);
        ra.define_value_xmm(idx, result);
    }
}
