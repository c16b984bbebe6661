//! Executable code buffer and runtime glue.
//!
//! One `mmap` allocation split into a near region (block entrypoints
//! and hot paths), a far region (cold paths: callback fallbacks) and a
//! deduplicated 128-bit constant pool addressed RIP-relative. The
//! buffer follows W^X discipline: `enable_writing`/`disable_writing`
//! flip page permissions around each emission batch.
//!
//! The run-code prelude, dispatcher loop and epilogue are generated
//! once at startup:
//!
//! ```text
//! run_code:      save callee-saves, R15 <- jit_state, switch MXCSR,
//!                jump to the entry block
//! dispatcher:    if cycles_remaining <= 0 or halt_requested: exit
//!                rax <- lookup_block(jit_state); jmp rax
//! force_return:  restore MXCSR and callee-saves, ret
//! ```

use std::collections::HashMap;
use std::io;
use std::ptr;

use bitflags::bitflags;

use crate::abi::ABI_CALLEE_SAVED;
use crate::encoder::*;
use crate::hostloc::Gpr;
use crate::jitstate::{self, JitState};
use crate::CodePtr;

/// Total buffer size.
const TOTAL_CODE_SIZE: usize = 32 * 1024 * 1024;
/// Near region: everything below this offset.
const FAR_CODE_OFFSET: usize = 24 * 1024 * 1024;
/// Constant pool: the final megabyte.
const CONSTANT_POOL_OFFSET: usize = TOTAL_CODE_SIZE - 1024 * 1024;

bitflags! {
    /// Host ISA extensions detected via CPUID, consulted by the
    /// per-opcode emitters to pick instruction sequences.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostFeature: u32 {
        const SSSE3   = 1 << 0;
        const SSE41   = 1 << 1;
        const AVX     = 1 << 2;
        const AVX2    = 1 << 3;
        const POPCNT  = 1 << 4;
        const LZCNT   = 1 << 5;
        const BMI1    = 1 << 6;
    }
}

fn detect_host_features() -> HostFeature {
    let mut features = HostFeature::empty();
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: cpuid leaves 1 and 7 are available on every x86-64.
        let leaf1 = unsafe { std::arch::x86_64::__cpuid(1) };
        if leaf1.ecx & (1 << 9) != 0 {
            features |= HostFeature::SSSE3;
        }
        if leaf1.ecx & (1 << 19) != 0 {
            features |= HostFeature::SSE41;
        }
        if leaf1.ecx & (1 << 23) != 0 {
            features |= HostFeature::POPCNT;
        }
        if leaf1.ecx & (1 << 28) != 0 {
            features |= HostFeature::AVX;
        }
        let leaf7 = unsafe { std::arch::x86_64::__cpuid_count(7, 0) };
        if leaf7.ebx & (1 << 5) != 0 {
            features |= HostFeature::AVX2;
        }
        if leaf7.ebx & (1 << 3) != 0 {
            features |= HostFeature::BMI1;
        }
        let ext = unsafe { std::arch::x86_64::__cpuid(0x8000_0001) };
        if ext.ecx & (1 << 5) != 0 {
            features |= HostFeature::LZCNT;
        }
    }
    features
}

/// Saved cursor positions across an in-place patch.
#[derive(Debug, Clone, Copy)]
pub struct CursorState {
    near: usize,
    far: usize,
    in_far: bool,
}

pub struct BlockOfCode {
    buf: *mut u8,
    size: usize,

    near_cursor: usize,
    far_cursor: usize,
    in_far_code: bool,

    pool_cursor: usize,
    pool_entries: HashMap<(u64, u64), usize>,

    features: HostFeature,

    // Offsets of the generated runtime glue.
    run_code_offset: usize,
    return_from_run_code: usize,
    force_return_offset: usize,
    /// First byte available for translated blocks.
    near_code_begin: usize,

    writable: bool,
}

// SAFETY: BlockOfCode owns its mapping exclusively.
unsafe impl Send for BlockOfCode {}

type RunCodeFn = unsafe extern "C" fn(*mut JitState, CodePtr);

impl BlockOfCode {
    /// Allocate the buffer and generate the run-code glue around the
    /// given block-lookup helper.
    pub fn new(lookup_block: extern "C" fn(*mut JitState) -> CodePtr) -> io::Result<BlockOfCode> {
        // SAFETY: anonymous private mapping, no file backing.
        let buf = unsafe {
            libc::mmap(
                ptr::null_mut(),
                TOTAL_CODE_SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if buf == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let mut code = BlockOfCode {
            buf: buf as *mut u8,
            size: TOTAL_CODE_SIZE,
            near_cursor: 0,
            far_cursor: FAR_CODE_OFFSET,
            in_far_code: false,
            pool_cursor: CONSTANT_POOL_OFFSET,
            pool_entries: HashMap::new(),
            features: detect_host_features(),
            run_code_offset: 0,
            return_from_run_code: 0,
            force_return_offset: 0,
            near_code_begin: 0,
            writable: true,
        };
        code.gen_run_code(lookup_block);
        code.near_code_begin = code.near_cursor;
        code.disable_writing();
        Ok(code)
    }

    pub fn host_features(&self) -> HostFeature {
        self.features
    }

    // -- Cursor management --

    /// Current write offset (absolute within the allocation).
    #[inline]
    pub fn offset(&self) -> usize {
        if self.in_far_code {
            self.far_cursor
        } else {
            self.near_cursor
        }
    }

    pub fn switch_to_far_code(&mut self) {
        assert!(!self.in_far_code);
        self.in_far_code = true;
    }

    pub fn switch_to_near_code(&mut self) {
        assert!(self.in_far_code);
        self.in_far_code = false;
    }

    pub fn in_far_code(&self) -> bool {
        self.in_far_code
    }

    pub fn near_remaining(&self) -> usize {
        FAR_CODE_OFFSET - self.near_cursor
    }

    pub fn far_remaining(&self) -> usize {
        CONSTANT_POOL_OFFSET - self.far_cursor
    }

    /// Reset both regions to just after the generated glue, orphaning
    /// all previously emitted blocks. The constant pool is retained.
    pub fn clear(&mut self) {
        self.near_cursor = self.near_code_begin;
        self.far_cursor = FAR_CODE_OFFSET;
        self.in_far_code = false;
    }

    #[inline]
    pub fn ptr_at(&self, offset: usize) -> CodePtr {
        assert!(offset <= self.size);
        // SAFETY: in-bounds by the assert.
        unsafe { self.buf.add(offset) as CodePtr }
    }

    /// Inverse of `ptr_at` for pointers into this buffer.
    pub fn offset_of_ptr(&self, ptr: CodePtr) -> usize {
        let base = self.buf as usize;
        let p = ptr as usize;
        assert!(p >= base && p < base + self.size);
        p - base
    }

    /// Rewind the active region's cursor (used when re-patching in
    /// place).
    pub fn set_offset(&mut self, offset: usize) {
        assert!(offset <= self.size);
        if self.in_far_code {
            self.far_cursor = offset;
        } else {
            self.near_cursor = offset;
        }
    }

    /// Snapshot both region cursors for in-place patching.
    pub fn save_cursor(&self) -> CursorState {
        CursorState {
            near: self.near_cursor,
            far: self.far_cursor,
            in_far: self.in_far_code,
        }
    }

    /// Point the writer at an arbitrary previously-emitted offset,
    /// selecting the region that contains it.
    pub fn set_cursor_at(&mut self, offset: usize) {
        assert!(offset < CONSTANT_POOL_OFFSET);
        self.in_far_code = offset >= FAR_CODE_OFFSET;
        self.set_offset(offset);
    }

    pub fn restore_cursor(&mut self, state: CursorState) {
        self.near_cursor = state.near;
        self.far_cursor = state.far;
        self.in_far_code = state.in_far;
    }

    // -- Raw emission --

    fn bump(&mut self, n: usize) -> usize {
        let cursor = if self.in_far_code {
            &mut self.far_cursor
        } else {
            &mut self.near_cursor
        };
        let at = *cursor;
        *cursor += n;
        if self.in_far_code {
            assert!(self.far_cursor <= CONSTANT_POOL_OFFSET, "far code overflow");
        } else {
            assert!(self.near_cursor <= FAR_CODE_OFFSET, "near code overflow");
        }
        at
    }

    #[inline]
    pub fn emit_u8(&mut self, val: u8) {
        debug_assert!(self.writable);
        let at = self.bump(1);
        unsafe { self.buf.add(at).write(val) };
    }

    #[inline]
    pub fn emit_u16(&mut self, val: u16) {
        debug_assert!(self.writable);
        let at = self.bump(2);
        unsafe { (self.buf.add(at) as *mut u16).write_unaligned(val) };
    }

    #[inline]
    pub fn emit_u32(&mut self, val: u32) {
        debug_assert!(self.writable);
        let at = self.bump(4);
        unsafe { (self.buf.add(at) as *mut u32).write_unaligned(val) };
    }

    #[inline]
    pub fn emit_u64(&mut self, val: u64) {
        debug_assert!(self.writable);
        let at = self.bump(8);
        unsafe { (self.buf.add(at) as *mut u64).write_unaligned(val) };
    }

    pub fn emit_bytes(&mut self, data: &[u8]) {
        debug_assert!(self.writable);
        let at = self.bump(data.len());
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), self.buf.add(at), data.len()) };
    }

    pub fn patch_u32(&mut self, offset: usize, val: u32) {
        debug_assert!(self.writable);
        assert!(offset + 4 <= self.size);
        unsafe { (self.buf.add(offset) as *mut u32).write_unaligned(val) };
    }

    pub fn patch_u64(&mut self, offset: usize, val: u64) {
        debug_assert!(self.writable);
        assert!(offset + 8 <= self.size);
        unsafe { (self.buf.add(offset) as *mut u64).write_unaligned(val) };
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        assert!(offset < self.size);
        unsafe { self.buf.add(offset).read() }
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size);
        unsafe { (self.buf.add(offset) as *const u32).read_unaligned() }
    }

    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        assert!(start + len <= self.size);
        // SAFETY: in-bounds; the region was written by the emitter.
        unsafe { std::slice::from_raw_parts(self.buf.add(start), len) }
    }

    // -- W^X --

    pub fn enable_writing(&mut self) {
        let ret = unsafe {
            libc::mprotect(
                self.buf as *mut libc::c_void,
                self.size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        assert_eq!(ret, 0, "mprotect(RW) failed");
        self.writable = true;
    }

    pub fn disable_writing(&mut self) {
        let ret = unsafe {
            libc::mprotect(
                self.buf as *mut libc::c_void,
                self.size,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        assert_eq!(ret, 0, "mprotect(RX) failed");
        self.writable = false;
    }

    // -- Constant pool --

    /// Intern a 128-bit constant; returns its buffer offset for
    /// RIP-relative addressing.
    pub fn mconst(&mut self, lower: u64, upper: u64) -> usize {
        if let Some(&offset) = self.pool_entries.get(&(lower, upper)) {
            return offset;
        }
        debug_assert!(self.writable);
        assert!(self.pool_cursor + 16 <= self.size, "constant pool overflow");
        let offset = self.pool_cursor;
        unsafe {
            (self.buf.add(offset) as *mut u64).write_unaligned(lower);
            (self.buf.add(offset + 8) as *mut u64).write_unaligned(upper);
        }
        self.pool_cursor += 16;
        self.pool_entries.insert((lower, upper), offset);
        offset
    }

    pub fn pool_len(&self) -> usize {
        self.pool_entries.len()
    }

    // -- Runtime glue --

    fn gen_run_code(&mut self, lookup_block: extern "C" fn(*mut JitState) -> CodePtr) {
        // run_code(jit_state: rdi, entry: rsi)
        self.run_code_offset = self.offset();
        for reg in ABI_CALLEE_SAVED {
            emit_push(self, reg);
        }
        // Keep 16-byte alignment for host calls out of emitted code.
        emit_arith_ri(self, ArithOp::Sub, true, Gpr::Rsp, 8);
        emit_mov_rr(self, true, Gpr::R15, Gpr::Rdi);
        emit_stmxcsr(self, Gpr::R15, jitstate::offset_save_host_mxcsr());
        emit_ldmxcsr(self, Gpr::R15, jitstate::offset_guest_mxcsr());
        emit_jmp_reg(self, Gpr::Rsi);

        // Dispatcher loop.
        self.return_from_run_code = self.offset();
        emit_arith_mi(
            self,
            ArithOp::Cmp,
            true,
            Gpr::R15,
            jitstate::offset_cycles_remaining(),
            0,
        );
        let exit_cycles = emit_jcc_forward(self, Cc::Le);
        emit_test_mi32(self, Gpr::R15, jitstate::offset_halt_requested(), u32::MAX);
        let exit_halt = emit_jcc_forward(self, Cc::Ne);
        emit_mov_rr(self, true, Gpr::Rdi, Gpr::R15);
        emit_mov_ri(self, true, Gpr::Rax, lookup_block as usize as u64);
        emit_call_reg(self, Gpr::Rax);
        emit_jmp_reg(self, Gpr::Rax);

        // Epilogue.
        resolve_forward(self, exit_cycles);
        resolve_forward(self, exit_halt);
        self.force_return_offset = self.offset();
        emit_ldmxcsr(self, Gpr::R15, jitstate::offset_save_host_mxcsr());
        emit_arith_ri(self, ArithOp::Add, true, Gpr::Rsp, 8);
        for reg in ABI_CALLEE_SAVED.iter().rev() {
            emit_pop(self, *reg);
        }
        emit_ret(self);
    }

    /// Dispatcher loop entry: cycle/halt check, block lookup, jump.
    pub fn return_from_run_code(&self) -> usize {
        self.return_from_run_code
    }

    /// Epilogue: restores MXCSR and callee-saves and returns to the
    /// caller of `run_code`.
    pub fn force_return(&self) -> usize {
        self.force_return_offset
    }

    /// Execute emitted code starting at `entry`.
    ///
    /// # Safety
    /// `entry` must be an entrypoint previously produced by the
    /// emitter against `jit_state`'s layout, and the buffer must be
    /// executable.
    pub unsafe fn run_code(&self, jit_state: *mut JitState, entry: CodePtr) {
        assert!(!self.writable, "attempted to run writable code");
        let f: RunCodeFn = std::mem::transmute(self.ptr_at(self.run_code_offset));
        f(jit_state, entry);
    }

    /// Entry into the dispatcher loop itself (used when no block is
    /// known yet).
    pub fn run_code_from_dispatch(&self) -> CodePtr {
        self.ptr_at(self.return_from_run_code)
    }

    /// `call` to a native function, with the `mov rax` fallback when
    /// the displacement does not fit in rel32.
    pub fn call_function(&mut self, target: usize) {
        let after = self.buf as usize + self.offset() + 5;
        let disp = (target as i64).wrapping_sub(after as i64);
        if i32::try_from(disp).is_ok() {
            emit_call_to_abs(self, target);
        } else {
            emit_mov_ri(self, true, Gpr::Rax, target as u64);
            emit_call_reg(self, Gpr::Rax);
        }
    }

    /// Pad the span since `begin` with NOPs up to exactly `size`
    /// bytes. The patch machinery relies on every patchable site
    /// having a fixed byte length.
    pub fn ensure_patch_location_size(&mut self, begin: usize, size: usize) {
        let written = self.offset() - begin;
        assert!(written <= size, "patch location too large: {written} > {size}");
        emit_nops(self, size - written);
    }
}

/// `call rel32` to an absolute host address (must be within rel32
/// range of the buffer; checked by the caller).
fn emit_call_to_abs(code: &mut BlockOfCode, target: usize) {
    let base = code.buf as usize;
    code.emit_u8(0xE8);
    let after = base + code.offset() + 4;
    code.emit_u32((target as i64 - after as i64) as u32);
}

impl Drop for BlockOfCode {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.buf as *mut libc::c_void, self.size);
        }
    }
}
