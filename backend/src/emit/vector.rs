//! 128-bit vector emitters.
//!
//! Each picks the shortest correct sequence for the detected host
//! feature set, with an SSE2 fallback.

use dbt_ir::block::{Block, InstIndex};

use crate::block_of_code::HostFeature;
use crate::encoder::*;
use crate::reg_alloc::RegAlloc;

use super::EmitX64;

impl EmitX64 {
    pub(super) fn emit_vector_binary(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, opc: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);
        let b = ra.use_xmm(&mut self.code, &mut args[1]);
        emit_sse_rr(&mut self.code, opc, result, b);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_vector_not(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);
        let ones = self.code.mconst(u64::MAX, u64::MAX);
        emit_sse_rip(&mut self.code, OPC_PXOR, result, ones);
        ra.define_value_xmm(idx, result);
    }

    pub(super) fn emit_vector_abs(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex, esize: u32) {
        let inst = block.inst(idx);
        let mut args = ra.get_argument_info(inst);
        let result = ra.use_scratch_xmm(&mut self.code, &mut args[0]);

        if self.code.host_features().contains(HostFeature::SSSE3) {
            let opc = match esize {
                8 => OPC_PABSB,
                16 => OPC_PABSW,
                _ => OPC_PABSD,
            };
            emit_sse_rr(&mut self.code, opc, result, result);
            ra.define_value_xmm(idx, result);
            return;
        }

        let tmp = ra.scratch_xmm(&mut self.code);
        let code = &mut self.code;
        match esize {
            8 => {
                // abs(x) = min_u(x, -x) for bytes.
                emit_sse_rr(code, OPC_PXOR, tmp, tmp);
                emit_sse_rr(code, OPC_PSUBB, tmp, result);
                emit_sse_rr(code, OPC_PMINUB, result, tmp);
            }
            16 => {
                emit_sse_rr(code, OPC_PXOR, tmp, tmp);
                emit_sse_rr(code, OPC_PSUBW, tmp, result);
                emit_sse_rr(code, OPC_PMAXSW, result, tmp);
            }
            _ => {
                // Sign-mask trick: (x ^ (x >> 31)) - (x >> 31).
                emit_movaps_rr(code, tmp, result);
                emit_psrad_ri(code, tmp, 31);
                emit_sse_rr(code, OPC_PXOR, result, tmp);
                emit_sse_rr(code, OPC_PSUBD, result, tmp);
            }
        }
        ra.define_value_xmm(idx, result);
    }
}
