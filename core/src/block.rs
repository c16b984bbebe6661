//! Basic blocks and instructions.
//!
//! Instructions live in a per-block arena and reference each other by
//! index, so the use-def graph needs no shared ownership and passes can
//! rewrite arguments in place. Removal tombstones an instruction to the
//! `Void` opcode; program order is the arena order.

use crate::location::LocationDescriptor;
use crate::opcode::Opcode;
use crate::types::{Cond, Type};
use crate::value::Value;
use crate::MAX_ARGS;

/// Index of an instruction within its block's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstIndex(pub u32);

impl InstIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single IR instruction.
#[derive(Debug, Clone)]
pub struct Inst {
    pub op: Opcode,
    args: [Value; MAX_ARGS],
    num_args: u8,
    /// Number of argument slots (including companion pseudo-ops)
    /// referencing this instruction. Must be exact: the register
    /// allocator frees a location when its accumulated uses reach this.
    use_count: u32,
    /// Attached companion pseudo-ops, if any.
    pub carry_inst: Option<InstIndex>,
    pub overflow_inst: Option<InstIndex>,
    pub nzcv_inst: Option<InstIndex>,
}

impl Inst {
    fn new(op: Opcode, args: &[Value]) -> Inst {
        assert!(args.len() <= MAX_ARGS);
        let mut a = [Value::ImmU1(false); MAX_ARGS];
        a[..args.len()].copy_from_slice(args);
        Inst {
            op,
            args: a,
            num_args: args.len() as u8,
            use_count: 0,
            carry_inst: None,
            overflow_inst: None,
            nzcv_inst: None,
        }
    }

    pub fn num_args(&self) -> usize {
        self.num_args as usize
    }

    pub fn args(&self) -> &[Value] {
        &self.args[..self.num_args as usize]
    }

    pub fn arg(&self, i: usize) -> Value {
        assert!(i < self.num_args());
        self.args[i]
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn result_type(&self) -> Type {
        self.op.result_type()
    }

    /// The value this instruction produces, for use as an operand.
    pub fn value_of(&self, idx: InstIndex) -> Value {
        Value::Inst(idx, self.result_type())
    }
}

/// The sole control-flow-leaving construct of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Invalid,
    /// Execute one instruction at the location through the reference
    /// interpreter, then return to the dispatcher.
    Interpret(LocationDescriptor),
    ReturnToDispatch,
    /// Direct branch with a cycle-budget check before chaining.
    LinkBlock(LocationDescriptor),
    /// Direct branch, chained unconditionally.
    LinkBlockFast(LocationDescriptor),
    /// Probe the return stack buffer before falling into the dispatcher.
    PopRSBHint,
    If {
        cond: Cond,
        then_: Box<Terminal>,
        else_: Box<Terminal>,
    },
    /// Test the halt-request word; exit to the dispatcher if set.
    CheckHalt(Box<Terminal>),
    /// Branch on a bit previously left in a known host flag.
    CheckBit {
        then_: Box<Terminal>,
        else_: Box<Terminal>,
    },
}

impl Terminal {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Terminal::Invalid)
    }
}

/// One translated guest basic block.
#[derive(Debug, Clone)]
pub struct Block {
    location: LocationDescriptor,
    end_location: LocationDescriptor,
    /// Entry condition; `AL` means unconditional entry.
    cond: Cond,
    cond_failed_location: Option<LocationDescriptor>,
    cond_failed_cycle_count: u64,
    insts: Vec<Inst>,
    terminal: Terminal,
    cycle_count: u64,
    /// Guest byte range `[start, end)` read while translating this
    /// block; the key into the range-invalidation map.
    guest_range: (u64, u64),
}

impl Block {
    pub fn new(location: LocationDescriptor) -> Block {
        Block {
            location,
            end_location: location,
            cond: Cond::AL,
            cond_failed_location: None,
            cond_failed_cycle_count: 0,
            insts: Vec::with_capacity(32),
            terminal: Terminal::Invalid,
            cycle_count: 0,
            guest_range: (location.pc(), location.pc()),
        }
    }

    pub fn location(&self) -> LocationDescriptor {
        self.location
    }

    pub fn end_location(&self) -> LocationDescriptor {
        self.end_location
    }

    pub fn set_end_location(&mut self, loc: LocationDescriptor) {
        self.end_location = loc;
    }

    pub fn condition(&self) -> Cond {
        self.cond
    }

    pub fn set_condition(&mut self, cond: Cond) {
        self.cond = cond;
    }

    pub fn condition_failed_location(&self) -> Option<LocationDescriptor> {
        self.cond_failed_location
    }

    pub fn set_condition_failed_location(&mut self, loc: LocationDescriptor) {
        self.cond_failed_location = Some(loc);
    }

    pub fn condition_failed_cycle_count(&self) -> u64 {
        self.cond_failed_cycle_count
    }

    pub fn set_condition_failed_cycle_count(&mut self, n: u64) {
        self.cond_failed_cycle_count = n;
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn add_cycle(&mut self) {
        self.cycle_count += 1;
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn has_terminal(&self) -> bool {
        !self.terminal.is_invalid()
    }

    pub fn set_terminal(&mut self, term: Terminal) {
        assert!(
            self.terminal.is_invalid(),
            "block already has a terminal: {:?}",
            self.terminal
        );
        self.terminal = term;
    }

    pub fn replace_terminal(&mut self, term: Terminal) {
        self.terminal = term;
    }

    pub fn guest_range(&self) -> (u64, u64) {
        self.guest_range
    }

    /// Extend the recorded guest byte range to cover `[addr, addr+len)`.
    pub fn record_code_read(&mut self, addr: u64, len: u64) {
        let (start, end) = self.guest_range;
        self.guest_range = (start.min(addr), end.max(addr + len));
    }

    // -- Instruction arena --

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn inst(&self, idx: InstIndex) -> &Inst {
        &self.insts[idx.index()]
    }

    pub fn inst_mut(&mut self, idx: InstIndex) -> &mut Inst {
        &mut self.insts[idx.index()]
    }

    pub fn indices(&self) -> impl DoubleEndedIterator<Item = InstIndex> {
        (0..self.insts.len() as u32).map(InstIndex)
    }

    /// Append an instruction, bumping the use counts of its operands.
    /// Operand types are checked against the opcode table.
    pub fn append(&mut self, op: Opcode, args: &[Value]) -> InstIndex {
        let decl = op.arg_types();
        assert_eq!(
            args.len(),
            decl.len(),
            "{}: expected {} args, got {}",
            op.name(),
            decl.len(),
            args.len()
        );
        for (i, (&arg, &ty)) in args.iter().zip(decl).enumerate() {
            assert!(
                ty == Type::Opaque || arg.ty() == ty,
                "{}: arg {} has type {} but {} is declared",
                op.name(),
                i,
                arg.ty(),
                ty
            );
            if let Some(src) = arg.inst() {
                self.insts[src.index()].use_count += 1;
            }
        }
        let idx = InstIndex(self.insts.len() as u32);
        self.insts.push(Inst::new(op, args));
        idx
    }

    /// Rewrite argument `slot` of `idx`, adjusting use counts on both
    /// the old and the new operand.
    pub fn replace_arg(&mut self, idx: InstIndex, slot: usize, new: Value) {
        let old = self.inst(idx).arg(slot);
        if let Some(src) = old.inst() {
            self.dec_use(src);
        }
        if let Some(src) = new.inst() {
            self.insts[src.index()].use_count += 1;
        }
        let inst = &mut self.insts[idx.index()];
        assert!(slot < inst.num_args());
        inst.args[slot] = new;
    }

    /// Tombstone an instruction, releasing its operands. Companion
    /// links pointing at or from it are cleared.
    pub fn remove(&mut self, idx: InstIndex) {
        let args: Vec<Value> = self.inst(idx).args().to_vec();
        for arg in args {
            if let Some(src) = arg.inst() {
                self.dec_use(src);
                let producer = &mut self.insts[src.index()];
                if producer.carry_inst == Some(idx) {
                    producer.carry_inst = None;
                }
                if producer.overflow_inst == Some(idx) {
                    producer.overflow_inst = None;
                }
                if producer.nzcv_inst == Some(idx) {
                    producer.nzcv_inst = None;
                }
            }
        }
        let inst = &mut self.insts[idx.index()];
        inst.op = Opcode::Void;
        inst.num_args = 0;
        inst.carry_inst = None;
        inst.overflow_inst = None;
        inst.nzcv_inst = None;
    }

    fn dec_use(&mut self, idx: InstIndex) {
        let inst = &mut self.insts[idx.index()];
        assert!(inst.use_count > 0, "use count underflow on {:?}", inst.op);
        inst.use_count -= 1;
    }
}
