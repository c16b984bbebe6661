mod a32;
mod a64;
mod cache;
mod thumb;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use dbt_exec::{Callbacks, Config, GuestArch, HaltHandle, Jit};

/// State shared between a test and its callbacks.
#[derive(Default)]
pub struct Shared {
    pub code: HashMap<u64, u32>,
    pub data: HashMap<u64, u8>,
    pub code_reads: usize,
    pub translated_instructions: usize,
    pub data_reads: usize,
    pub data_writes: usize,
    pub svcs: Vec<u32>,
    pub exceptions: Vec<(u64, dbt_exec::Exception)>,
    /// Set after Jit construction; SVC halts through it.
    pub halt: Option<HaltHandle>,
    pub halt_on_svc: bool,
    /// When set, SVC also requests a deferred cache invalidation of
    /// the given range.
    pub invalidate_on_svc: Option<(dbt_exec::InvalidationHandle, u64, u64)>,
    /// Budget served through `get_ticks_remaining`/`add_ticks` when
    /// tick callbacks are enabled.
    pub ticks_remaining: u64,
    pub ticks_added: u64,
}

impl Shared {
    pub fn read(&mut self, vaddr: u64, bytes: u32) -> u64 {
        self.data_reads += 1;
        let mut value = 0u64;
        for i in 0..bytes {
            let byte = self.data.get(&(vaddr + u64::from(i))).copied().unwrap_or(0);
            value |= u64::from(byte) << (8 * i);
        }
        value
    }

    pub fn write(&mut self, vaddr: u64, value: u64, bytes: u32) {
        self.data_writes += 1;
        for i in 0..bytes {
            self.data
                .insert(vaddr + u64::from(i), (value >> (8 * i)) as u8);
        }
    }
}

pub struct Env(pub Rc<RefCell<Shared>>);

impl Callbacks for Env {
    fn memory_read_code(&mut self, vaddr: u64) -> u32 {
        let mut shared = self.0.borrow_mut();
        shared.code_reads += 1;
        shared
            .code
            .get(&(vaddr & !3))
            .copied()
            .unwrap_or(0xE7F0_00F0)
    }

    fn read8(&mut self, vaddr: u64) -> u8 {
        self.0.borrow_mut().read(vaddr, 1) as u8
    }

    fn read16(&mut self, vaddr: u64) -> u16 {
        self.0.borrow_mut().read(vaddr, 2) as u16
    }

    fn read32(&mut self, vaddr: u64) -> u32 {
        self.0.borrow_mut().read(vaddr, 4) as u32
    }

    fn read64(&mut self, vaddr: u64) -> u64 {
        self.0.borrow_mut().read(vaddr, 8)
    }

    fn write8(&mut self, vaddr: u64, value: u8) {
        self.0.borrow_mut().write(vaddr, u64::from(value), 1);
    }

    fn write16(&mut self, vaddr: u64, value: u16) {
        self.0.borrow_mut().write(vaddr, u64::from(value), 2);
    }

    fn write32(&mut self, vaddr: u64, value: u32) {
        self.0.borrow_mut().write(vaddr, u64::from(value), 4);
    }

    fn write64(&mut self, vaddr: u64, value: u64) {
        self.0.borrow_mut().write(vaddr, value, 8);
    }

    fn call_svc(&mut self, swi: u32) {
        let mut shared = self.0.borrow_mut();
        shared.svcs.push(swi);
        if let Some((handle, start, length)) = shared.invalidate_on_svc.as_ref() {
            handle.invalidate_range(*start, *length);
        }
        if shared.halt_on_svc {
            shared.halt.as_ref().expect("halt handle not wired").halt();
        }
    }

    fn exception_raised(&mut self, pc: u64, exception: dbt_exec::Exception) {
        self.0.borrow_mut().exceptions.push((pc, exception));
    }

    fn add_ticks(&mut self, ticks: u64) {
        let mut shared = self.0.borrow_mut();
        shared.ticks_added += ticks;
        shared.ticks_remaining = shared.ticks_remaining.saturating_sub(ticks);
    }

    fn get_ticks_remaining(&mut self) -> u64 {
        self.0.borrow().ticks_remaining
    }

    fn pre_translate_hook(
        &mut self,
        _is_thumb: bool,
        _pc: u64,
        _ir: &mut dbt_ir::IrEmitter,
    ) {
        self.0.borrow_mut().translated_instructions += 1;
    }
}

/// Build a Jit over a word-addressed code image. SVC halts execution
/// by default, so programs conventionally end in one.
pub fn make_jit(arch: GuestArch, base: u64, words: &[u32]) -> (Jit, Rc<RefCell<Shared>>) {
    make_jit_with(arch, base, words, None)
}

pub fn make_jit_with(
    arch: GuestArch,
    base: u64,
    words: &[u32],
    page_table: Option<*mut *mut u8>,
) -> (Jit, Rc<RefCell<Shared>>) {
    let config = Config {
        arch,
        page_table,
        ..Config::default()
    };
    make_jit_config(base, words, config)
}

pub fn make_jit_config(
    base: u64,
    words: &[u32],
    config: Config,
) -> (Jit, Rc<RefCell<Shared>>) {
    let shared = Rc::new(RefCell::new(Shared {
        halt_on_svc: true,
        ..Shared::default()
    }));
    for (i, &word) in words.iter().enumerate() {
        shared
            .borrow_mut()
            .code
            .insert(base + 4 * i as u64, word);
    }
    let jit = Jit::new(Box::new(Env(shared.clone())), config).expect("jit construction failed");
    shared.borrow_mut().halt = Some(jit.halt_handle());
    (jit, shared)
}

/// Pack a halfword stream into the word image used by `make_jit`.
pub fn thumb_words(halfwords: &[u16]) -> Vec<u32> {
    halfwords
        .chunks(2)
        .map(|chunk| {
            let lo = u32::from(chunk[0]);
            let hi = chunk.get(1).map(|&h| u32::from(h)).unwrap_or(0xDF00);
            lo | (hi << 16)
        })
        .collect()
}

pub const CPSR_N: u32 = 1 << 31;
pub const CPSR_Z: u32 = 1 << 30;
pub const CPSR_C: u32 = 1 << 29;
pub const CPSR_V: u32 = 1 << 28;
pub const CPSR_T: u32 = 1 << 5;
