//! Per-block emission, terminal lowering, block chaining and the code
//! cache.
//!
//! `EmitX64` owns the executable buffer, the descriptor → entrypoint
//! map, the pending-patch tables and the guest-range reverse map. A
//! block is emitted once per descriptor and chained to its neighbours
//! by rewriting fixed-size patch sites in place as targets appear.

mod data_processing;
mod fp;
mod memory;
mod state;
mod terminal;
mod vector;

use std::ffi::c_void;

use rustc_hash::FxHashMap;

use dbt_ir::block::{Block, InstIndex, Terminal};
use dbt_ir::{Cond, LocationDescriptor, Opcode};

use crate::block_of_code::BlockOfCode;
use crate::encoder::*;
use crate::hostloc::Gpr;
use crate::jitstate;
use crate::reg_alloc::RegAlloc;

/// Fixed byte sizes of the patchable sites. `ensure_patch_location_size`
/// pads every emission to exactly these, so a later rewrite can never
/// overflow its window.
pub const PATCH_JG_SIZE: usize = 23;
pub const PATCH_JMP_SIZE: usize = 22;
pub const PATCH_MOV_RCX_SIZE: usize = 10;

/// Refuse to start a block unless this much room remains.
const MIN_NEAR_REMAINING: usize = 64 * 1024;
const MIN_FAR_REMAINING: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The code buffer is exhausted; the caller should clear the cache
    /// and retry once.
    #[error("code cache is full")]
    CodeCacheFull,
}

/// Cache entry for one emitted block.
#[derive(Debug, Clone, Copy)]
pub struct BlockDescriptor {
    pub entrypoint: usize,
    pub size: usize,
}

/// Native entry points for the embedder callbacks, reached from
/// emitted code through the context pointer.
#[derive(Clone, Copy)]
pub struct Thunks {
    pub read8: extern "C" fn(*mut c_void, u64) -> u64,
    pub read16: extern "C" fn(*mut c_void, u64) -> u64,
    pub read32: extern "C" fn(*mut c_void, u64) -> u64,
    pub read64: extern "C" fn(*mut c_void, u64) -> u64,
    pub write8: extern "C" fn(*mut c_void, u64, u64),
    pub write16: extern "C" fn(*mut c_void, u64, u64),
    pub write32: extern "C" fn(*mut c_void, u64, u64),
    pub write64: extern "C" fn(*mut c_void, u64, u64),
    pub call_svc: extern "C" fn(*mut c_void, u32),
    pub exception_raised: extern "C" fn(*mut c_void, u32),
    pub interpret: extern "C" fn(*mut c_void),
}

pub struct EmitX64 {
    pub code: BlockOfCode,
    thunks: Thunks,
    ctx: *mut c_void,
    has_page_table: bool,

    basic_blocks: FxHashMap<LocationDescriptor, BlockDescriptor>,
    patch_jg_locations: FxHashMap<LocationDescriptor, Vec<usize>>,
    patch_jmp_locations: FxHashMap<LocationDescriptor, Vec<usize>>,
    patch_mov_rcx_locations: FxHashMap<LocationDescriptor, Vec<usize>>,
    block_ranges: crate::block_ranges::BlockRanges,
}

impl EmitX64 {
    pub fn new(code: BlockOfCode, thunks: Thunks) -> EmitX64 {
        EmitX64 {
            code,
            thunks,
            ctx: std::ptr::null_mut(),
            has_page_table: false,
            basic_blocks: FxHashMap::default(),
            patch_jg_locations: FxHashMap::default(),
            patch_jmp_locations: FxHashMap::default(),
            patch_mov_rcx_locations: FxHashMap::default(),
            block_ranges: crate::block_ranges::BlockRanges::new(),
        }
    }

    /// Late-bound context pointer baked into emitted call sequences.
    /// Must be set before the first block is emitted.
    pub fn set_ctx(&mut self, ctx: *mut c_void) {
        self.ctx = ctx;
    }

    pub fn ctx(&self) -> *mut c_void {
        self.ctx
    }

    /// Enable the inline page-table fast path for 32-bit addressed
    /// guest memory accesses (see `JitState::page_table`).
    pub fn set_has_page_table(&mut self, enabled: bool) {
        self.has_page_table = enabled;
    }

    pub fn has_page_table(&self) -> bool {
        self.has_page_table
    }

    pub fn thunks(&self) -> &Thunks {
        &self.thunks
    }

    pub fn get_basic_block(&self, descriptor: LocationDescriptor) -> Option<BlockDescriptor> {
        self.basic_blocks.get(&descriptor).copied()
    }

    pub fn block_count(&self) -> usize {
        self.basic_blocks.len()
    }

    // -- Block emission --

    /// Emit host code for an optimized block and insert it into the
    /// cache, draining any patch sites that were waiting for it.
    pub fn emit(&mut self, block: &Block) -> Result<BlockDescriptor, EmitError> {
        assert!(!self.ctx.is_null(), "context pointer has not been set");
        if self.code.near_remaining() < MIN_NEAR_REMAINING
            || self.code.far_remaining() < MIN_FAR_REMAINING
        {
            return Err(EmitError::CodeCacheFull);
        }

        let descriptor = block.location();
        assert!(
            !self.basic_blocks.contains_key(&descriptor),
            "descriptor {descriptor:?} is already cached"
        );

        self.code.enable_writing();
        let entrypoint = self.code.offset();

        // Charge the block's cycles up front.
        let cycles = block.cycle_count() as i32;
        emit_arith_mi(
            &mut self.code,
            ArithOp::Sub,
            true,
            Gpr::R15,
            jitstate::offset_cycles_remaining(),
            cycles,
        );

        // Conditional entry: jump to the condition-failed tail when the
        // entry condition does not hold.
        let cond_failed_jump = if block.condition() != Cond::AL {
            Some(self.emit_cond_jump(block.condition().invert()))
        } else {
            None
        };

        let mut ra = RegAlloc::new(block);
        for idx in block.indices() {
            let op = block.inst(idx).op;
            if op == Opcode::Void || op.is_pseudo() {
                continue;
            }
            self.emit_inst(&mut ra, block, idx);
            ra.end_of_alloc_scope();
        }
        ra.assert_no_more_uses();

        self.emit_terminal(block.terminal(), block.location());

        if let Some(jump) = cond_failed_jump {
            resolve_forward(&mut self.code, jump);
            // Refund the cycles the failed path does not execute.
            let failed = block.condition_failed_cycle_count() as i32;
            if cycles - failed != 0 {
                emit_arith_mi(
                    &mut self.code,
                    ArithOp::Add,
                    true,
                    Gpr::R15,
                    jitstate::offset_cycles_remaining(),
                    cycles - failed,
                );
            }
            let fail_location = block
                .condition_failed_location()
                .expect("conditional block without a condition-failed location");
            self.emit_terminal(&Terminal::LinkBlock(fail_location), block.location());
        }

        let size = self.code.offset() - entrypoint;
        let descriptor_entry = BlockDescriptor { entrypoint, size };
        self.basic_blocks.insert(descriptor, descriptor_entry);

        let (range_start, range_end) = block.guest_range();
        if range_end > range_start {
            self.block_ranges
                .add_range(range_start, range_end, descriptor);
        }

        self.drain_patches(descriptor, entrypoint);
        self.code.disable_writing();

        tracing::debug!(
            location = ?descriptor,
            entrypoint,
            size,
            cycles = block.cycle_count(),
            "emitted block"
        );
        Ok(descriptor_entry)
    }

    fn emit_inst(&mut self, ra: &mut RegAlloc, block: &Block, idx: InstIndex) {
        use Opcode::*;
        match block.inst(idx).op {
            A32GetRegister => self.emit_a32_get_register(ra, block, idx),
            A32SetRegister => self.emit_a32_set_register(ra, block, idx),
            A32GetExtReg32 => self.emit_a32_get_ext_reg32(ra, block, idx),
            A32SetExtReg32 => self.emit_a32_set_ext_reg32(ra, block, idx),
            A32GetExtReg64 => self.emit_a32_get_ext_reg64(ra, block, idx),
            A32SetExtReg64 => self.emit_a32_set_ext_reg64(ra, block, idx),
            A32GetQ => self.emit_a32_get_q(ra, block, idx),
            A32SetQ => self.emit_a32_set_q(ra, block, idx),
            A32GetCpsr => self.emit_a32_get_cpsr(ra, block, idx),
            A32SetCpsr => self.emit_a32_set_cpsr(ra, block, idx),
            GetCFlag => self.emit_get_c_flag(ra, block, idx),
            SetNFlag => self.emit_set_flag(ra, block, idx, 31),
            SetZFlag => self.emit_set_flag(ra, block, idx, 30),
            SetCFlag => self.emit_set_flag(ra, block, idx, 29),
            SetVFlag => self.emit_set_flag(ra, block, idx, 28),
            SetCpsrNzcv => self.emit_set_cpsr_nzcv(ra, block, idx),
            A64GetW => self.emit_a64_get_w(ra, block, idx),
            A64GetX => self.emit_a64_get_x(ra, block, idx),
            A64SetW => self.emit_a64_set_w(ra, block, idx),
            A64SetX => self.emit_a64_set_x(ra, block, idx),
            A64GetSP => self.emit_a64_get_sp(ra, block, idx),
            A64SetSP => self.emit_a64_set_sp(ra, block, idx),
            A64GetVector => self.emit_a64_get_vector(ra, block, idx),
            A64SetVector => self.emit_a64_set_vector(ra, block, idx),
            A64SetPC => self.emit_a64_set_pc(ra, block, idx),
            SetCheckBit => self.emit_set_check_bit(ra, block, idx),
            Pack2x32To1x64 => self.emit_pack_2x32(ra, block, idx),
            LeastSignificantWord => self.emit_least_significant_word(ra, block, idx),
            MostSignificantWord => self.emit_most_significant_word(ra, block, idx),
            LeastSignificantHalf | LeastSignificantByte => {
                self.emit_least_significant_narrow(ra, block, idx)
            }
            MostSignificantBit => self.emit_most_significant_bit(ra, block, idx),
            IsZero32 => self.emit_is_zero(ra, block, idx, false),
            IsZero64 => self.emit_is_zero(ra, block, idx, true),
            TestBit => self.emit_test_bit(ra, block, idx),
            Add32 => self.emit_add(ra, block, idx, false),
            Add64 => self.emit_add(ra, block, idx, true),
            Sub32 => self.emit_sub(ra, block, idx, false),
            Sub64 => self.emit_sub(ra, block, idx, true),
            Mul32 => self.emit_mul(ra, block, idx, false),
            Mul64 => self.emit_mul(ra, block, idx, true),
            SignedDiv32 => self.emit_div32(ra, block, idx, true),
            UnsignedDiv32 => self.emit_div32(ra, block, idx, false),
            And32 => self.emit_logical(ra, block, idx, ArithOp::And, false),
            And64 => self.emit_logical(ra, block, idx, ArithOp::And, true),
            Eor32 => self.emit_logical(ra, block, idx, ArithOp::Xor, false),
            Eor64 => self.emit_logical(ra, block, idx, ArithOp::Xor, true),
            Or32 => self.emit_logical(ra, block, idx, ArithOp::Or, false),
            Or64 => self.emit_logical(ra, block, idx, ArithOp::Or, true),
            Not32 => self.emit_not(ra, block, idx, false),
            Not64 => self.emit_not(ra, block, idx, true),
            LogicalShiftLeft32 => self.emit_shift32(ra, block, idx, ShiftKind::Lsl),
            LogicalShiftRight32 => self.emit_shift32(ra, block, idx, ShiftKind::Lsr),
            ArithmeticShiftRight32 => self.emit_shift32(ra, block, idx, ShiftKind::Asr),
            RotateRight32 => self.emit_shift32(ra, block, idx, ShiftKind::Ror),
            RotateRightExtended => self.emit_rotate_right_extended(ra, block, idx),
            LogicalShiftLeft64 => self.emit_shift64(ra, block, idx, ShiftOp::Shl),
            LogicalShiftRight64 => self.emit_shift64(ra, block, idx, ShiftOp::Shr),
            ArithmeticShiftRight64 => self.emit_shift64(ra, block, idx, ShiftOp::Sar),
            SignExtendByteToWord => self.emit_extend(ra, block, idx, Extend::S8To32),
            SignExtendHalfToWord => self.emit_extend(ra, block, idx, Extend::S16To32),
            SignExtendWordToLong => self.emit_extend(ra, block, idx, Extend::S32To64),
            ZeroExtendByteToWord => self.emit_extend(ra, block, idx, Extend::Z8To32),
            ZeroExtendHalfToWord => self.emit_extend(ra, block, idx, Extend::Z16To32),
            ZeroExtendWordToLong => self.emit_extend(ra, block, idx, Extend::Z32To64),
            ByteReverseWord => self.emit_byte_reverse(ra, block, idx, 32),
            ByteReverseHalf => self.emit_byte_reverse(ra, block, idx, 16),
            ByteReverseDual => self.emit_byte_reverse(ra, block, idx, 64),
            CountLeadingZeros32 => self.emit_clz(ra, block, idx, false),
            CountLeadingZeros64 => self.emit_clz(ra, block, idx, true),
            ConditionalSelect32 => self.emit_conditional_select(ra, block, idx, false),
            ConditionalSelect64 => self.emit_conditional_select(ra, block, idx, true),
            TransferToFP32 => self.emit_transfer_to_fp(ra, block, idx, false),
            TransferToFP64 => self.emit_transfer_to_fp(ra, block, idx, true),
            TransferFromFP32 => self.emit_transfer_from_fp(ra, block, idx, false),
            TransferFromFP64 => self.emit_transfer_from_fp(ra, block, idx, true),
            ReadMemory8 => self.emit_read_memory(ra, block, idx, 8),
            ReadMemory16 => self.emit_read_memory(ra, block, idx, 16),
            ReadMemory32 => self.emit_read_memory(ra, block, idx, 32),
            ReadMemory64 => self.emit_read_memory(ra, block, idx, 64),
            WriteMemory8 => self.emit_write_memory(ra, block, idx, 8),
            WriteMemory16 => self.emit_write_memory(ra, block, idx, 16),
            WriteMemory32 => self.emit_write_memory(ra, block, idx, 32),
            WriteMemory64 => self.emit_write_memory(ra, block, idx, 64),
            CallSupervisor => self.emit_call_supervisor(ra, block, idx),
            ExceptionRaised => self.emit_exception_raised(ra, block, idx),
            PushRSB => self.emit_push_rsb(ra, block, idx),
            FPAdd32 => self.emit_fp_binary(ra, block, idx, OPC_ADDSS),
            FPAdd64 => self.emit_fp_binary(ra, block, idx, OPC_ADDSD),
            FPSub32 => self.emit_fp_binary(ra, block, idx, OPC_SUBSS),
            FPSub64 => self.emit_fp_binary(ra, block, idx, OPC_SUBSD),
            FPMul32 => self.emit_fp_binary(ra, block, idx, OPC_MULSS),
            FPMul64 => self.emit_fp_binary(ra, block, idx, OPC_MULSD),
            FPDiv32 => self.emit_fp_binary(ra, block, idx, OPC_DIVSS),
            FPDiv64 => self.emit_fp_binary(ra, block, idx, OPC_DIVSD),
            FPAbs32 => self.emit_fp_abs(ra, block, idx, false),
            FPAbs64 => self.emit_fp_abs(ra, block, idx, true),
            FPNeg32 => self.emit_fp_neg(ra, block, idx, false),
            FPNeg64 => self.emit_fp_neg(ra, block, idx, true),
            VectorAdd8 => self.emit_vector_binary(ra, block, idx, OPC_PADDB),
            VectorAdd16 => self.emit_vector_binary(ra, block, idx, OPC_PADDW),
            VectorAdd32 => self.emit_vector_binary(ra, block, idx, OPC_PADDD),
            VectorAdd64 => self.emit_vector_binary(ra, block, idx, OPC_PADDQ),
            VectorSub8 => self.emit_vector_binary(ra, block, idx, OPC_PSUBB),
            VectorSub16 => self.emit_vector_binary(ra, block, idx, OPC_PSUBW),
            VectorSub32 => self.emit_vector_binary(ra, block, idx, OPC_PSUBD),
            VectorSub64 => self.emit_vector_binary(ra, block, idx, OPC_PSUBQ),
            VectorAnd => self.emit_vector_binary(ra, block, idx, OPC_PAND),
            VectorOr => self.emit_vector_binary(ra, block, idx, OPC_POR),
            VectorEor => self.emit_vector_binary(ra, block, idx, OPC_PXOR),
            VectorNot => self.emit_vector_not(ra, block, idx),
            VectorAbs8 => self.emit_vector_abs(ra, block, idx, 8),
            VectorAbs16 => self.emit_vector_abs(ra, block, idx, 16),
            VectorAbs32 => self.emit_vector_abs(ra, block, idx, 32),
            op => panic!("no emitter for {:?}", op),
        }
    }

    // -- Cache management --

    /// Drop every cached block and patch site, reset the buffer to the
    /// end of the generated glue.
    pub fn clear_cache(&mut self) {
        self.basic_blocks.clear();
        self.patch_jg_locations.clear();
        self.patch_jmp_locations.clear();
        self.patch_mov_rcx_locations.clear();
        self.block_ranges.clear();
        self.code.enable_writing();
        self.code.clear();
        self.code.disable_writing();
        tracing::debug!("code cache cleared");
    }

    /// Remove every block whose translation read `[start, start+len)`.
    /// Host bytes are orphaned, not reclaimed; chained jumps into them
    /// are reverted to their placeholder form.
    pub fn invalidate_cache_range(&mut self, start: u64, length: u64) {
        let hit = self.block_ranges.invalidate_range(start, length);
        if hit.is_empty() {
            return;
        }
        self.code.enable_writing();
        for descriptor in &hit {
            self.basic_blocks.remove(descriptor);
            self.unpatch(*descriptor);
        }
        self.code.disable_writing();
        tracing::debug!(
            start,
            length,
            invalidated = hit.len(),
            "invalidated cache range"
        );
    }

    // -- Patching --

    fn drain_patches(&mut self, descriptor: LocationDescriptor, entrypoint: usize) {
        for site in self
            .patch_jg_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_JG_SIZE, |emit| {
                emit.emit_patch_jg_body(descriptor, Some(entrypoint));
            });
        }
        for site in self
            .patch_jmp_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_JMP_SIZE, |emit| {
                emit.emit_patch_jmp_body(descriptor, Some(entrypoint));
            });
        }
        for site in self
            .patch_mov_rcx_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_MOV_RCX_SIZE, |emit| {
                emit.emit_patch_mov_rcx_body(Some(entrypoint));
            });
        }
    }

    /// Revert every site chained to `descriptor` to its placeholder.
    fn unpatch(&mut self, descriptor: LocationDescriptor) {
        for site in self
            .patch_jg_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_JG_SIZE, |emit| {
                emit.emit_patch_jg_body(descriptor, None);
            });
        }
        for site in self
            .patch_jmp_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_JMP_SIZE, |emit| {
                emit.emit_patch_jmp_body(descriptor, None);
            });
        }
        for site in self
            .patch_mov_rcx_locations
            .get(&descriptor)
            .map(|v| v.clone())
            .unwrap_or_default()
        {
            self.rewrite_patch(site, PATCH_MOV_RCX_SIZE, |emit| {
                emit.emit_patch_mov_rcx_body(None);
            });
        }
    }

    /// Rewrite one patch site in place; the replacement must occupy
    /// exactly `size` bytes.
    fn rewrite_patch(&mut self, site: usize, size: usize, f: impl FnOnce(&mut EmitX64)) {
        let saved = self.code.save_cursor();
        self.code.set_cursor_at(site);
        f(self);
        self.code
            .ensure_patch_location_size(site, size);
        assert_eq!(self.code.offset(), site + size, "patch size mismatch");
        self.code.restore_cursor(saved);
    }

    /// `jg` towards `descriptor`: a direct jump when its block exists,
    /// otherwise a PC write followed by `jg` into the dispatcher.
    pub(crate) fn emit_patch_jg(&mut self, descriptor: LocationDescriptor) {
        let target = self.get_basic_block(descriptor).map(|b| b.entrypoint);
        let begin = self.code.offset();
        self.emit_patch_jg_body(descriptor, target);
        self.code.ensure_patch_location_size(begin, PATCH_JG_SIZE);
        self.patch_jg_locations
            .entry(descriptor)
            .or_default()
            .push(begin);
    }

    fn emit_patch_jg_body(&mut self, descriptor: LocationDescriptor, target: Option<usize>) {
        match target {
            Some(offset) => emit_jcc_to(&mut self.code, Cc::G, offset),
            None => {
                self.emit_write_pc(descriptor);
                let dispatch = self.code.return_from_run_code();
                emit_jcc_to(&mut self.code, Cc::G, dispatch);
            }
        }
    }

    /// `jmp` towards `descriptor`, same placeholder scheme.
    pub(crate) fn emit_patch_jmp(&mut self, descriptor: LocationDescriptor) {
        let target = self.get_basic_block(descriptor).map(|b| b.entrypoint);
        let begin = self.code.offset();
        self.emit_patch_jmp_body(descriptor, target);
        self.code.ensure_patch_location_size(begin, PATCH_JMP_SIZE);
        self.patch_jmp_locations
            .entry(descriptor)
            .or_default()
            .push(begin);
    }

    fn emit_patch_jmp_body(&mut self, descriptor: LocationDescriptor, target: Option<usize>) {
        match target {
            Some(offset) => emit_jmp_to(&mut self.code, offset),
            None => {
                self.emit_write_pc(descriptor);
                let dispatch = self.code.return_from_run_code();
                emit_jmp_to(&mut self.code, dispatch);
            }
        }
    }

    /// `mov rcx, <code ptr>` for the RSB: the dispatcher loop when the
    /// target block is not yet known.
    pub(crate) fn emit_patch_mov_rcx(&mut self, descriptor: LocationDescriptor) {
        let target = self.get_basic_block(descriptor).map(|b| b.entrypoint);
        let begin = self.code.offset();
        self.emit_patch_mov_rcx_body(target);
        self.code
            .ensure_patch_location_size(begin, PATCH_MOV_RCX_SIZE);
        self.patch_mov_rcx_locations
            .entry(descriptor)
            .or_default()
            .push(begin);
    }

    fn emit_patch_mov_rcx_body(&mut self, target: Option<usize>) {
        let offset = target.unwrap_or_else(|| self.code.return_from_run_code());
        let ptr = self.code.ptr_at(offset) as u64;
        emit_mov_rcx_imm64_fixed(&mut self.code, ptr);
    }

    // -- Shared helpers --

    /// Store `descriptor`'s PC into the guest state.
    pub(crate) fn emit_write_pc(&mut self, descriptor: LocationDescriptor) {
        if descriptor.is_a64() {
            emit_mov_ri(&mut self.code, true, Gpr::Rax, descriptor.pc());
            emit_store(
                &mut self.code,
                true,
                Gpr::Rax,
                Gpr::R15,
                jitstate::offset_pc64(),
            );
        } else {
            emit_store_imm32(
                &mut self.code,
                false,
                Gpr::R15,
                jitstate::offset_regs(15),
                descriptor.pc() as u32,
            );
        }
    }

    /// Forward jump taken when `cond` holds for the guest NZCV word.
    /// Clobbers RAX/RCX/RDX; only used outside allocation scopes.
    pub(crate) fn emit_cond_jump(&mut self, cond: Cond) -> FwdJump {
        let code = &mut self.code;
        let nzcv_off = jitstate::offset_cpsr_nzcv();
        const N: u32 = 1 << 31;
        const Z: u32 = 1 << 30;
        const C: u32 = 1 << 29;
        const V: u32 = 1 << 28;
        match cond {
            Cond::EQ | Cond::NE => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, Z);
                emit_jcc_forward(code, if cond == Cond::EQ { Cc::Ne } else { Cc::E })
            }
            Cond::CS | Cond::CC => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, C);
                emit_jcc_forward(code, if cond == Cond::CS { Cc::Ne } else { Cc::E })
            }
            Cond::MI | Cond::PL => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, N);
                emit_jcc_forward(code, if cond == Cond::MI { Cc::Ne } else { Cc::E })
            }
            Cond::VS | Cond::VC => {
                emit_test_mi32(code, Gpr::R15, nzcv_off, V);
                emit_jcc_forward(code, if cond == Cond::VS { Cc::Ne } else { Cc::E })
            }
            Cond::HI | Cond::LS => {
                // C set and Z clear.
                emit_load(code, false, Gpr::Rax, Gpr::R15, nzcv_off);
                emit_arith_ri(code, ArithOp::And, false, Gpr::Rax, (C | Z) as i32);
                emit_arith_ri(code, ArithOp::Cmp, false, Gpr::Rax, C as i32);
                emit_jcc_forward(code, if cond == Cond::HI { Cc::E } else { Cc::Ne })
            }
            Cond::GE | Cond::LT => {
                // N == V.
                emit_load(code, false, Gpr::Rax, Gpr::R15, nzcv_off);
                emit_mov_rr(code, false, Gpr::Rcx, Gpr::Rax);
                emit_shift_ri(code, ShiftOp::Shr, false, Gpr::Rcx, 3);
                emit_arith_rr(code, ArithOp::Xor, false, Gpr::Rax, Gpr::Rcx);
                emit_test_ri(code, false, Gpr::Rax, V);
                emit_jcc_forward(code, if cond == Cond::GE { Cc::E } else { Cc::Ne })
            }
            Cond::GT | Cond::LE => {
                // Z clear and N == V.
                emit_load(code, false, Gpr::Rax, Gpr::R15, nzcv_off);
                emit_mov_rr(code, false, Gpr::Rcx, Gpr::Rax);
                emit_shift_ri(code, ShiftOp::Shr, false, Gpr::Rcx, 3);
                emit_arith_rr(code, ArithOp::Xor, false, Gpr::Rcx, Gpr::Rax);
                emit_arith_ri(code, ArithOp::And, false, Gpr::Rcx, V as i32);
                emit_mov_rr(code, false, Gpr::Rdx, Gpr::Rax);
                emit_arith_ri(code, ArithOp::And, false, Gpr::Rdx, Z as i32);
                emit_arith_rr(code, ArithOp::Or, false, Gpr::Rcx, Gpr::Rdx);
                emit_jcc_forward(code, if cond == Cond::GT { Cc::E } else { Cc::Ne })
            }
            Cond::AL | Cond::NV => emit_jmp_forward(code),
        }
    }
}

/// 32-bit shift flavor with ARM semantics (amounts up to 255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

/// Integer extension flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extend {
    S8To32,
    S16To32,
    S32To64,
    Z8To32,
    Z16To32,
    Z32To64,
}
