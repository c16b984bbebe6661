//! The `Jit` facade and its run loop.

use std::collections::VecDeque;
use std::ffi::c_void;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use dbt_backend::emit::{EmitError, Thunks};
use dbt_backend::jitstate::JitState;
use dbt_backend::{BlockOfCode, CodePtr, EmitX64};
use dbt_frontend::TranslationOptions;
use dbt_ir::opt;
use dbt_ir::{Exception, LocationDescriptor};

use crate::callbacks::{Callbacks, RomBridge, TranslateBridge};

/// Guest instruction-set architecture a `Jit` instance emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestArch {
    A32,
    A64,
}

/// Construction-time configuration.
pub struct Config {
    pub arch: GuestArch,
    /// Base of a `[*mut u8; 1 << 20]` guest page table (4 KiB pages).
    /// A non-null entry lets emitted code bypass the memory callbacks;
    /// null entries fall back to them.
    pub page_table: Option<*mut *mut u8>,
    /// Drive cycle budgeting through `add_ticks`/`get_ticks_remaining`
    /// instead of the `run(cycle_count)` argument.
    pub use_tick_callbacks: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            arch: GuestArch::A32,
            page_table: None,
            use_tick_callbacks: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum InvalidationRequest {
    Range(u64, u64),
    Clear,
}

struct Inner {
    emitter: EmitX64,
    jit_state: Box<JitState>,
    callbacks: Box<dyn Callbacks>,
    arch: GuestArch,
    use_tick_callbacks: bool,
    is_executing: bool,
    single_step: bool,
    /// Invalidation requests raised from inside emitted code (via an
    /// [`InvalidationHandle`]), drained at the next run-loop boundary.
    deferred: Arc<Mutex<VecDeque<InvalidationRequest>>>,
    /// Dispatcher block lookups (cache hits and misses alike); chained
    /// and RSB-predicted transfers bypass this.
    lookup_count: u64,
}

pub struct Jit {
    inner: Box<Inner>,
}

/// Cross-thread halt requester. Holds a pointer to the `halt_requested`
/// word inside the owning `Jit`'s state.
///
/// # Safety
/// The handle must not outlive the `Jit` it came from.
pub struct HaltHandle {
    halt: *const AtomicU32,
}

// SAFETY: the pointee is an atomic; all accesses go through it.
unsafe impl Send for HaltHandle {}
unsafe impl Sync for HaltHandle {}

impl HaltHandle {
    pub fn halt(&self) {
        // SAFETY: valid while the Jit lives, per the type contract.
        unsafe { (*self.halt).fetch_or(1, Ordering::SeqCst) };
    }
}

/// Cache-invalidation requester usable from inside callbacks (i.e.
/// while emulated code is on the stack). Requests are queued, the JIT
/// is halted, and the queue is consumed before the dispatcher resumes.
///
/// # Safety
/// As with [`HaltHandle`], must not outlive the owning `Jit`.
pub struct InvalidationHandle {
    queue: Arc<Mutex<VecDeque<InvalidationRequest>>>,
    halt: HaltHandle,
}

impl InvalidationHandle {
    pub fn invalidate_range(&self, start: u64, length: u64) {
        self.queue
            .lock()
            .unwrap()
            .push_back(InvalidationRequest::Range(start, length));
        self.halt.halt();
    }

    pub fn clear_cache(&self) {
        self.queue
            .lock()
            .unwrap()
            .push_back(InvalidationRequest::Clear);
        self.halt.halt();
    }
}

// -- Callback thunks --
//
// Emitted code reaches the boxed `Inner` through the context pointer
// stored in `JitState`. Exclusive access holds because the Jit is
// single-threaded and no Rust reference to `Inner` is live while
// emitted code runs.

unsafe fn inner<'a>(ctx: *mut c_void) -> &'a mut Inner {
    &mut *(ctx as *mut Inner)
}

extern "C" fn thunk_read8(ctx: *mut c_void, vaddr: u64) -> u64 {
    unsafe { u64::from(inner(ctx).callbacks.read8(vaddr)) }
}

extern "C" fn thunk_read16(ctx: *mut c_void, vaddr: u64) -> u64 {
    unsafe { u64::from(inner(ctx).callbacks.read16(vaddr)) }
}

extern "C" fn thunk_read32(ctx: *mut c_void, vaddr: u64) -> u64 {
    unsafe { u64::from(inner(ctx).callbacks.read32(vaddr)) }
}

extern "C" fn thunk_read64(ctx: *mut c_void, vaddr: u64) -> u64 {
    unsafe { inner(ctx).callbacks.read64(vaddr) }
}

extern "C" fn thunk_write8(ctx: *mut c_void, vaddr: u64, value: u64) {
    unsafe { inner(ctx).callbacks.write8(vaddr, value as u8) }
}

extern "C" fn thunk_write16(ctx: *mut c_void, vaddr: u64, value: u64) {
    unsafe { inner(ctx).callbacks.write16(vaddr, value as u16) }
}

extern "C" fn thunk_write32(ctx: *mut c_void, vaddr: u64, value: u64) {
    unsafe { inner(ctx).callbacks.write32(vaddr, value as u32) }
}

extern "C" fn thunk_write64(ctx: *mut c_void, vaddr: u64, value: u64) {
    unsafe { inner(ctx).callbacks.write64(vaddr, value) }
}

extern "C" fn thunk_call_svc(ctx: *mut c_void, swi: u32) {
    unsafe { inner(ctx).callbacks.call_svc(swi) }
}

extern "C" fn thunk_exception_raised(ctx: *mut c_void, code: u32) {
    let inner = unsafe { inner(ctx) };
    let pc = inner.current_pc();
    inner
        .callbacks
        .exception_raised(pc, Exception::from_code(code as u8));
}

extern "C" fn thunk_interpret(ctx: *mut c_void) {
    let inner = unsafe { inner(ctx) };
    let pc = inner.current_pc();
    inner.callbacks.interpreter_fallback(pc);
}

extern "C" fn thunk_lookup_block(jit_state: *mut JitState) -> CodePtr {
    // SAFETY: jit_state belongs to a live Inner; see module note.
    let inner = unsafe { inner((*jit_state).ctx) };
    inner.lookup_current_block()
}

const THUNKS: Thunks = Thunks {
    read8: thunk_read8,
    read16: thunk_read16,
    read32: thunk_read32,
    read64: thunk_read64,
    write8: thunk_write8,
    write16: thunk_write16,
    write32: thunk_write32,
    write64: thunk_write64,
    call_svc: thunk_call_svc,
    exception_raised: thunk_exception_raised,
    interpret: thunk_interpret,
};

impl Inner {
    fn current_pc(&self) -> u64 {
        match self.arch {
            GuestArch::A32 => u64::from(self.jit_state.regs[15]),
            GuestArch::A64 => self.jit_state.pc64,
        }
    }

    /// Descriptor of the current guest execution context, derived from
    /// the architectural state.
    fn current_descriptor(&self) -> LocationDescriptor {
        let descriptor = match self.arch {
            GuestArch::A32 => {
                let cpsr = self.jit_state.cpsr_jaifm;
                LocationDescriptor::a32(
                    self.jit_state.regs[15],
                    cpsr & (1 << 5) != 0,
                    cpsr & (1 << 9) != 0,
                    (self.jit_state.fpscr_mode >> 22) & 0xF,
                    0,
                )
            }
            GuestArch::A64 => {
                LocationDescriptor::a64(self.jit_state.pc64, (self.jit_state.fpscr_mode >> 22) & 0xF)
            }
        };
        descriptor.set_single_stepping(self.single_step)
    }

    /// Keep the runtime copy of the descriptor's non-PC bits in sync;
    /// the RSB probe compares against it.
    fn sync_upper_descriptor(&mut self, descriptor: LocationDescriptor) {
        let pc_mask = if descriptor.is_a64() {
            (1u64 << 56) - 1
        } else {
            0xFFFF_FFFF
        };
        self.jit_state.upper_location_descriptor = descriptor.unique_hash() & !pc_mask;
    }

    /// Cache lookup; on a miss, translate, optimize and emit. Called
    /// both from the dispatcher thunk and from `run`.
    fn lookup_current_block(&mut self) -> CodePtr {
        self.lookup_count += 1;
        let descriptor = self.current_descriptor();
        self.sync_upper_descriptor(descriptor);
        if let Some(block) = self.emitter.get_basic_block(descriptor) {
            return self.emitter.code.ptr_at(block.entrypoint);
        }
        let block = self.translate_and_optimize(descriptor);
        match self.emitter.emit(&block) {
            Ok(desc) => self.emitter.code.ptr_at(desc.entrypoint),
            Err(EmitError::CodeCacheFull) => {
                // One clear-and-retry; a second failure is a bug.
                tracing::warn!("code cache full; clearing and retrying");
                self.emitter.clear_cache();
                self.jit_state.reset_rsb();
                let desc = self
                    .emitter
                    .emit(&block)
                    .expect("block does not fit an empty code cache");
                self.emitter.code.ptr_at(desc.entrypoint)
            }
        }
    }

    fn translate_and_optimize(&mut self, descriptor: LocationDescriptor) -> dbt_ir::Block {
        let options = TranslationOptions {
            single_step: descriptor.single_stepping(),
        };
        let mut bridge = TranslateBridge {
            cb: self.callbacks.as_mut(),
        };
        let mut block = dbt_frontend::translate(descriptor, &mut bridge, options);

        opt::get_set_elimination(&mut block);
        let rom = RomBridge {
            cb: std::cell::RefCell::new(self.callbacks.as_mut()),
        };
        opt::constant_propagation(&mut block, &rom);
        opt::dead_code_elimination(&mut block);
        if cfg!(debug_assertions) {
            opt::verification_pass(&block);
        }
        block
    }

    fn perform_deferred_invalidation(&mut self) {
        loop {
            let request = self.deferred.lock().unwrap().pop_front();
            match request {
                Some(InvalidationRequest::Clear) => {
                    self.emitter.clear_cache();
                    self.jit_state.reset_rsb();
                }
                Some(InvalidationRequest::Range(start, length)) => {
                    self.emitter.invalidate_cache_range(start, length);
                }
                None => break,
            }
        }
    }

    fn run(&mut self, cycle_count: u64) -> u64 {
        assert!(!self.is_executing, "Jit::run is not reentrant");
        self.is_executing = true;
        self.jit_state.halt_requested.store(0, Ordering::SeqCst);

        let mut cycles_executed: u64 = 0;
        loop {
            let budget = if self.use_tick_callbacks {
                self.callbacks.get_ticks_remaining()
            } else {
                cycle_count - cycles_executed
            };
            if budget == 0 {
                break;
            }

            self.jit_state.cycles_to_run = budget as i64;
            self.jit_state.cycles_remaining = budget as i64;

            let entry = self.lookup_current_block();
            let jit_state = self.jit_state.as_mut() as *mut JitState;
            // SAFETY: entry came from our emitter against this state.
            unsafe { self.emitter.code.run_code(jit_state, entry) };

            let executed =
                (self.jit_state.cycles_to_run - self.jit_state.cycles_remaining).max(0) as u64;
            cycles_executed += executed;
            if self.use_tick_callbacks {
                self.callbacks.add_ticks(executed);
            }

            if self.jit_state.halt_requested.load(Ordering::SeqCst) != 0 {
                break;
            }
            if !self.use_tick_callbacks && cycles_executed >= cycle_count {
                break;
            }
            // Invalidation requested mid-run without a halt (not
            // expected, but harmless to honor here).
            if !self.deferred.lock().unwrap().is_empty() {
                break;
            }
        }

        self.is_executing = false;
        self.perform_deferred_invalidation();
        cycles_executed
    }
}

impl Jit {
    pub fn new(callbacks: Box<dyn Callbacks>, config: Config) -> io::Result<Jit> {
        let code = BlockOfCode::new(thunk_lookup_block)?;
        let emitter = EmitX64::new(code, THUNKS);

        let mut inner = Box::new(Inner {
            emitter,
            jit_state: Box::new(JitState::default()),
            callbacks,
            arch: config.arch,
            use_tick_callbacks: config.use_tick_callbacks,
            is_executing: false,
            single_step: false,
            deferred: Arc::new(Mutex::new(VecDeque::new())),
            lookup_count: 0,
        });

        let ctx = inner.as_mut() as *mut Inner as *mut c_void;
        inner.emitter.set_ctx(ctx);
        inner.jit_state.ctx = ctx;
        if let Some(page_table) = config.page_table {
            inner.jit_state.page_table = page_table as u64;
            inner.emitter.set_has_page_table(true);
        }

        Ok(Jit { inner })
    }

    /// Run the guest for approximately `cycle_count` cycles; returns
    /// the number actually executed.
    pub fn run(&mut self, cycle_count: u64) -> u64 {
        self.inner.run(cycle_count)
    }

    /// Execute exactly one guest instruction.
    pub fn step(&mut self) {
        self.inner.single_step = true;
        self.inner.run(1);
        self.inner.single_step = false;
    }

    pub fn clear_cache(&mut self) {
        assert!(!self.inner.is_executing);
        self.inner.emitter.clear_cache();
        self.inner.jit_state.reset_rsb();
    }

    pub fn invalidate_cache_range(&mut self, start: u64, length: u64) {
        assert!(!self.inner.is_executing);
        self.inner.emitter.invalidate_cache_range(start, length);
    }

    /// A deferred-invalidation requester for use from callbacks; must
    /// not outlive this `Jit`.
    pub fn invalidation_handle(&self) -> InvalidationHandle {
        InvalidationHandle {
            queue: self.inner.deferred.clone(),
            halt: self.halt_handle(),
        }
    }

    /// Reset all guest state. The code cache survives; it is keyed on
    /// immutable guest code.
    pub fn reset(&mut self) {
        assert!(!self.inner.is_executing);
        self.inner.jit_state.reset();
    }

    pub fn halt_execution(&mut self) {
        self.inner.jit_state.halt_requested.fetch_or(1, Ordering::SeqCst);
    }

    /// A cross-thread halt requester; must not outlive this `Jit`.
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle {
            halt: &self.inner.jit_state.halt_requested as *const AtomicU32,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.inner.is_executing
    }

    /// Number of dispatcher block lookups so far. Chained blocks and
    /// RSB-predicted returns do not pass through the dispatcher, so
    /// this is a direct measure of chaining effectiveness.
    pub fn lookup_count(&self) -> u64 {
        self.inner.lookup_count
    }

    // -- Register accessors --

    pub fn regs(&self) -> &[u32; 16] {
        &self.inner.jit_state.regs
    }

    pub fn regs_mut(&mut self) -> &mut [u32; 16] {
        &mut self.inner.jit_state.regs
    }

    pub fn ext_regs(&self) -> &[u32; 64] {
        &self.inner.jit_state.ext_regs
    }

    pub fn ext_regs_mut(&mut self) -> &mut [u32; 64] {
        &mut self.inner.jit_state.ext_regs
    }

    pub fn vec_regs(&self) -> &[[u64; 2]; 32] {
        &self.inner.jit_state.vecs
    }

    pub fn vec_regs_mut(&mut self) -> &mut [[u64; 2]; 32] {
        &mut self.inner.jit_state.vecs
    }

    pub fn x_regs(&self) -> &[u64; 31] {
        &self.inner.jit_state.x
    }

    pub fn x_regs_mut(&mut self) -> &mut [u64; 31] {
        &mut self.inner.jit_state.x
    }

    pub fn cpsr(&self) -> u32 {
        self.inner.jit_state.cpsr_nzcv | self.inner.jit_state.cpsr_jaifm
    }

    pub fn set_cpsr(&mut self, cpsr: u32) {
        self.inner.jit_state.cpsr_nzcv = cpsr & 0xF000_0000;
        self.inner.jit_state.cpsr_jaifm = cpsr & 0x0FFF_FFFF;
    }

    pub fn fpscr(&self) -> u32 {
        self.inner.jit_state.fpscr()
    }

    pub fn set_fpscr(&mut self, fpscr: u32) {
        self.inner.jit_state.set_fpscr(fpscr);
    }

    pub fn sp(&self) -> u64 {
        self.inner.jit_state.sp
    }

    pub fn set_sp(&mut self, sp: u64) {
        self.inner.jit_state.sp = sp;
    }

    pub fn pc(&self) -> u64 {
        self.inner.current_pc()
    }

    pub fn set_pc(&mut self, pc: u64) {
        match self.inner.arch {
            GuestArch::A32 => self.inner.jit_state.regs[15] = pc as u32,
            GuestArch::A64 => self.inner.jit_state.pc64 = pc,
        }
    }

    /// Render the IR of the block at `descriptor` (translated fresh,
    /// with the standard passes applied).
    pub fn disassemble(&mut self, descriptor: LocationDescriptor) -> String {
        let block = self.inner.translate_and_optimize(descriptor);
        format!("{block}")
    }
}
