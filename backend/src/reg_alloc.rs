//! Linear-scan register allocation, per block.
//!
//! SSA values never cross block boundaries, so a single in-order pass
//! suffices. Each IR instruction's emitter asks for its operands
//! (`use_*`), result locations (`scratch_*` / `define_value`) and ends
//! its allocation scope; locations whose resident values are fully
//! consumed are reclaimed there. Use counts come from the IR and must
//! be exact.

use dbt_ir::block::{Block, Inst, InstIndex};
use dbt_ir::types::Type;
use dbt_ir::value::Value;
use dbt_ir::Cond;

use crate::abi::{ABI_CALLER_SAVED, ABI_PARAMS, ABI_RETURN};
use crate::block_of_code::BlockOfCode;
use crate::encoder::*;
use crate::hostloc::{Gpr, HostLoc, Xmm, ANY_GPR, ANY_XMM, HOST_LOC_COUNT};
use crate::jitstate;

/// Runtime bit width of a type as the allocator tracks it.
fn bit_width(ty: Type) -> u32 {
    match ty {
        Type::U1 | Type::U8 => 8,
        Type::U16 => 16,
        Type::U32 | Type::F32 | Type::Nzcv => 32,
        Type::U64 | Type::F64 => 64,
        Type::F128 => 128,
        _ => panic!("type {ty} cannot be represented at runtime"),
    }
}

#[derive(Default, Clone)]
struct HostLocInfo {
    values: Vec<InstIndex>,
    total_uses: u32,
    accumulated_uses: u32,
    current_references: u32,
    is_being_used: bool,
    is_scratch: bool,
    max_bit_width: u32,
}

impl HostLocInfo {
    fn is_locked(&self) -> bool {
        self.is_being_used
    }

    fn is_empty(&self) -> bool {
        !self.is_being_used && self.values.is_empty()
    }

    fn is_last_use(&self) -> bool {
        !self.is_being_used
            && self.current_references == 1
            && self.accumulated_uses + 1 == self.total_uses
    }

    fn read_lock(&mut self) {
        assert!(!self.is_scratch);
        self.is_being_used = true;
    }

    fn write_lock(&mut self) {
        assert!(!self.is_being_used);
        self.is_being_used = true;
        self.is_scratch = true;
    }

    fn add_arg_reference(&mut self) {
        self.current_references += 1;
        assert!(self.accumulated_uses + self.current_references <= self.total_uses);
    }

    fn end_of_alloc_scope(&mut self) {
        self.accumulated_uses += self.current_references;
        self.current_references = 0;

        if self.total_uses == self.accumulated_uses {
            self.values.clear();
            self.accumulated_uses = 0;
            self.total_uses = 0;
            self.max_bit_width = 0;
        }

        self.is_being_used = false;
        self.is_scratch = false;
    }

    fn contains(&self, inst: InstIndex) -> bool {
        self.values.contains(&inst)
    }

    fn add_value(&mut self, inst: InstIndex, uses: u32, width: u32) {
        self.values.push(inst);
        self.total_uses += uses;
        self.max_bit_width = self.max_bit_width.max(width);
    }
}

/// A single-consumption handle on one IR operand.
pub struct Argument {
    value: Option<Value>,
    allocated: bool,
}

impl Argument {
    fn empty() -> Argument {
        Argument {
            value: None,
            allocated: false,
        }
    }

    fn value(&self) -> Value {
        self.value.expect("argument slot is empty")
    }

    pub fn ty(&self) -> Type {
        self.value().ty()
    }

    pub fn is_immediate(&self) -> bool {
        self.value().is_immediate()
    }

    pub fn imm_u1(&self) -> bool {
        self.value().imm_u1()
    }

    pub fn imm_u8(&self) -> u8 {
        self.value().imm_u8()
    }

    pub fn imm_u32(&self) -> u32 {
        self.value().imm_u32()
    }

    pub fn imm_u64(&self) -> u64 {
        self.value().imm_to_u64()
    }

    pub fn imm_cond(&self) -> Cond {
        self.value().imm_cond()
    }

    /// True when the immediate fits a sign-extended 32-bit operand.
    pub fn fits_in_imm_s32(&self) -> bool {
        if !self.is_immediate() {
            return false;
        }
        let imm = self.value().imm_to_u64() as i64;
        i32::try_from(imm).is_ok()
    }
}

pub struct RegAlloc {
    info: Vec<HostLocInfo>,
    /// Snapshot of per-instruction use counts and result types.
    uses: Vec<u32>,
    types: Vec<Type>,
}

impl RegAlloc {
    pub fn new(block: &Block) -> RegAlloc {
        let mut uses = Vec::with_capacity(block.len());
        let mut types = Vec::with_capacity(block.len());
        for idx in block.indices() {
            let inst = block.inst(idx);
            uses.push(inst.use_count());
            types.push(inst.result_type());
        }
        // A companion pseudo-op references its producer in the IR but
        // is never consumed as a runtime argument: the producer's
        // emitter binds the companion's value directly. Discount those
        // references so locations are reclaimed exactly.
        for idx in block.indices() {
            let inst = block.inst(idx);
            if inst.op.is_pseudo() {
                if let Some(producer) = inst.arg(0).inst() {
                    uses[producer.index()] -= 1;
                }
            }
        }
        RegAlloc {
            info: vec![HostLocInfo::default(); HOST_LOC_COUNT],
            uses,
            types,
        }
    }

    fn loc_info(&self, loc: HostLoc) -> &HostLocInfo {
        assert!(loc != HostLoc::Gpr(Gpr::Rsp) && loc != HostLoc::Gpr(Gpr::R15));
        &self.info[loc.index()]
    }

    fn loc_info_mut(&mut self, loc: HostLoc) -> &mut HostLocInfo {
        assert!(loc != HostLoc::Gpr(Gpr::Rsp) && loc != HostLoc::Gpr(Gpr::R15));
        &mut self.info[loc.index()]
    }

    pub fn value_location(&self, inst: InstIndex) -> Option<HostLoc> {
        (0..HOST_LOC_COUNT)
            .map(HostLoc::from_index)
            .find(|&loc| self.info[loc.index()].contains(inst))
    }

    /// Snapshot an instruction's operands. Each non-immediate operand
    /// must already be defined; its location gains a reference for the
    /// duration of the scope.
    pub fn get_argument_info(&mut self, inst: &Inst) -> Vec<Argument> {
        let mut out = Vec::with_capacity(inst.num_args());
        for &arg in inst.args() {
            let mut slot = Argument::empty();
            slot.value = Some(arg);
            if let Some(src) = arg.inst() {
                let loc = self
                    .value_location(src)
                    .expect("argument has not been defined");
                self.loc_info_mut(loc).add_arg_reference();
            }
            out.push(slot);
        }
        out
    }

    // -- Use operations --

    pub fn use_gpr(&mut self, code: &mut BlockOfCode, arg: &mut Argument) -> Gpr {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_impl(code, arg.value(), ANY_GPR).gpr()
    }

    pub fn use_xmm(&mut self, code: &mut BlockOfCode, arg: &mut Argument) -> Xmm {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_impl(code, arg.value(), ANY_XMM).xmm()
    }

    /// Pin an argument into a specific register (e.g. CL for shifts).
    pub fn use_at(&mut self, code: &mut BlockOfCode, arg: &mut Argument, loc: HostLoc) {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_impl(code, arg.value(), &[loc]);
    }

    pub fn use_scratch_gpr(&mut self, code: &mut BlockOfCode, arg: &mut Argument) -> Gpr {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_scratch_impl(code, arg.value(), ANY_GPR).gpr()
    }

    pub fn use_scratch_xmm(&mut self, code: &mut BlockOfCode, arg: &mut Argument) -> Xmm {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_scratch_impl(code, arg.value(), ANY_XMM).xmm()
    }

    pub fn use_scratch_at(&mut self, code: &mut BlockOfCode, arg: &mut Argument, loc: HostLoc) {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        self.use_scratch_impl(code, arg.value(), &[loc]);
    }

    pub fn scratch_gpr(&mut self, code: &mut BlockOfCode) -> Gpr {
        self.scratch_impl(code, ANY_GPR).gpr()
    }

    /// Scratch GPR restricted to a candidate list (e.g. callee-saved
    /// registers for values that must survive an emitted call).
    pub fn scratch_gpr_from(&mut self, code: &mut BlockOfCode, desired: &[HostLoc]) -> Gpr {
        self.scratch_impl(code, desired).gpr()
    }

    pub fn scratch_xmm(&mut self, code: &mut BlockOfCode) -> Xmm {
        self.scratch_impl(code, ANY_XMM).xmm()
    }

    pub fn scratch_at(&mut self, code: &mut BlockOfCode, loc: HostLoc) {
        self.scratch_impl(code, &[loc]);
    }

    // -- Define operations --

    pub fn define_value_gpr(&mut self, inst: InstIndex, reg: Gpr) {
        self.define_value_impl(inst, HostLoc::Gpr(reg));
    }

    pub fn define_value_xmm(&mut self, inst: InstIndex, reg: Xmm) {
        self.define_value_impl(inst, HostLoc::Xmm(reg));
    }

    /// Alias the result to an argument's current location.
    pub fn define_value_from_arg(
        &mut self,
        code: &mut BlockOfCode,
        inst: InstIndex,
        arg: &mut Argument,
    ) {
        assert!(!arg.allocated, "argument consumed twice");
        arg.allocated = true;
        let value = arg.value();
        if value.is_immediate() {
            let loc = self.scratch_impl(code, ANY_GPR);
            self.define_value_impl(inst, loc);
            self.load_immediate(code, value, loc);
            return;
        }
        let loc = self
            .value_location(value.inst().unwrap())
            .expect("argument has not been defined");
        self.define_value_impl(inst, loc);
    }

    fn define_value_impl(&mut self, inst: InstIndex, loc: HostLoc) {
        assert!(
            self.value_location(inst).is_none(),
            "instruction has already been defined"
        );
        let uses = self.uses[inst.index()];
        let width = bit_width(self.types[inst.index()]);
        self.loc_info_mut(loc).add_value(inst, uses, width);
    }

    // -- Host calls --

    /// Arrange up to four arguments into the SysV parameter registers,
    /// spill all caller-saves, and (optionally) bind `result` to the
    /// return register. The caller emits the `call` itself.
    pub fn host_call(
        &mut self,
        code: &mut BlockOfCode,
        result: Option<InstIndex>,
        args: [Option<&mut Argument>; 4],
    ) {
        self.scratch_at(code, HostLoc::Gpr(ABI_RETURN));
        if let Some(inst) = result {
            self.define_value_impl(inst, HostLoc::Gpr(ABI_RETURN));
        }

        for (i, arg) in args.into_iter().enumerate() {
            let param = HostLoc::Gpr(ABI_PARAMS[i]);
            match arg {
                Some(arg) => {
                    let ty = arg.ty();
                    self.use_scratch_at(code, arg, param);
                    // Callees take zero-extended word arguments.
                    let reg = ABI_PARAMS[i];
                    match ty {
                        Type::U1 | Type::U8 => emit_movzx8(code, reg, reg),
                        Type::U16 => emit_movzx16(code, reg, reg),
                        Type::U32 => emit_mov_rr(code, false, reg, reg),
                        _ => {}
                    }
                }
                None => {
                    self.scratch_at(code, param);
                }
            }
        }

        for loc in ABI_CALLER_SAVED {
            if matches!(loc, HostLoc::Gpr(g) if g == ABI_RETURN || ABI_PARAMS.contains(&g)) {
                continue;
            }
            self.scratch_impl(code, &[loc]);
        }
    }

    // -- Scope management --

    /// Close the current instruction's allocation scope, releasing all
    /// locks and reclaiming fully-consumed locations.
    pub fn end_of_alloc_scope(&mut self) {
        for info in &mut self.info {
            info.end_of_alloc_scope();
        }
    }

    /// All values must have been consumed by the end of the block.
    pub fn assert_no_more_uses(&self) {
        assert!(
            self.info.iter().all(|i| i.is_empty()),
            "values remain live after the last instruction"
        );
    }

    // -- Implementation --

    fn use_impl(&mut self, code: &mut BlockOfCode, value: Value, desired: &[HostLoc]) -> HostLoc {
        if value.is_immediate() {
            let loc = self.scratch_impl(code, desired);
            return self.load_immediate(code, value, loc);
        }

        let inst = value.inst().unwrap();
        let current = self.value_location(inst).expect("value not defined");

        if desired.contains(&current) {
            self.loc_info_mut(current).read_lock();
            return current;
        }

        if self.loc_info(current).is_locked() {
            return self.use_scratch_existing(code, inst, current, desired);
        }

        let destination = self.select_register(desired);
        if HostLoc::same_class(destination, current) {
            self.exchange(code, destination, current);
        } else {
            self.move_out_of_the_way(code, destination);
            self.do_move(code, destination, current);
        }
        self.loc_info_mut(destination).read_lock();
        destination
    }

    fn use_scratch_impl(
        &mut self,
        code: &mut BlockOfCode,
        value: Value,
        desired: &[HostLoc],
    ) -> HostLoc {
        if value.is_immediate() {
            let loc = self.scratch_impl(code, desired);
            return self.load_immediate(code, value, loc);
        }

        let inst = value.inst().unwrap();
        let current = self.value_location(inst).expect("value not defined");

        if desired.contains(&current) && !self.loc_info(current).is_locked() {
            if !self.loc_info(current).is_last_use() {
                // Other uses remain: give them somewhere to live
                // before this register is clobbered.
                self.move_out_of_the_way(code, current);
            }
            self.loc_info_mut(current).write_lock();
            return current;
        }

        self.use_scratch_existing(code, inst, current, desired)
    }

    fn use_scratch_existing(
        &mut self,
        code: &mut BlockOfCode,
        _inst: InstIndex,
        current: HostLoc,
        desired: &[HostLoc],
    ) -> HostLoc {
        let destination = self.select_register(desired);
        self.move_out_of_the_way(code, destination);
        self.copy_to_scratch(code, destination, current);
        self.loc_info_mut(destination).write_lock();
        destination
    }

    fn scratch_impl(&mut self, code: &mut BlockOfCode, desired: &[HostLoc]) -> HostLoc {
        let loc = self.select_register(desired);
        self.move_out_of_the_way(code, loc);
        self.loc_info_mut(loc).write_lock();
        loc
    }

    /// Deterministic candidate selection: first unlocked location,
    /// preferring empty ones in list order. Register allocation must
    /// be reproducible, so no tie is ever broken arbitrarily.
    fn select_register(&self, desired: &[HostLoc]) -> HostLoc {
        let mut fallback = None;
        for &loc in desired {
            let info = self.loc_info(loc);
            if info.is_locked() {
                continue;
            }
            if info.is_empty() {
                return loc;
            }
            if fallback.is_none() {
                fallback = Some(loc);
            }
        }
        fallback.expect("all candidate registers are locked")
    }

    fn load_immediate(&mut self, code: &mut BlockOfCode, value: Value, loc: HostLoc) -> HostLoc {
        match loc {
            HostLoc::Gpr(reg) => {
                emit_mov_ri(code, true, reg, value.imm_to_u64());
            }
            HostLoc::Xmm(reg) => {
                let imm = value.imm_to_u64();
                if imm == 0 {
                    emit_sse_rr(code, OPC_PXOR, reg, reg);
                } else {
                    let pool = code.mconst(imm, 0);
                    emit_sse_rip(code, OPC_MOVDQA_VW, reg, pool);
                }
            }
            _ => panic!("cannot load an immediate into {loc:?}"),
        }
        loc
    }

    fn do_move(&mut self, code: &mut BlockOfCode, to: HostLoc, from: HostLoc) {
        assert!(self.loc_info(to).is_empty() && !self.loc_info(from).is_locked());
        if self.loc_info(from).is_empty() {
            return;
        }
        assert!(
            self.loc_info(from).max_bit_width <= to.bit_width(),
            "value does not fit in {to:?}"
        );
        self.emit_move(code, to, from);
        self.info[to.index()] = std::mem::take(&mut self.info[from.index()]);
    }

    fn copy_to_scratch(&mut self, code: &mut BlockOfCode, to: HostLoc, from: HostLoc) {
        assert!(self.loc_info(to).is_empty() && !self.loc_info(from).is_empty());
        self.emit_move(code, to, from);
    }

    fn exchange(&mut self, code: &mut BlockOfCode, a: HostLoc, b: HostLoc) {
        assert!(!self.loc_info(a).is_locked() && !self.loc_info(b).is_locked());
        if self.loc_info(a).is_empty() {
            self.do_move(code, a, b);
            return;
        }
        if self.loc_info(b).is_empty() {
            self.do_move(code, b, a);
            return;
        }
        match (a, b) {
            (HostLoc::Gpr(ra), HostLoc::Gpr(rb)) => emit_xchg(code, true, ra, rb),
            _ => panic!("exchange is only meaningful between GPRs"),
        }
        self.info.swap(a.index(), b.index());
    }

    fn move_out_of_the_way(&mut self, code: &mut BlockOfCode, loc: HostLoc) {
        assert!(!self.loc_info(loc).is_locked());
        if !self.loc_info(loc).is_empty() {
            self.spill_register(code, loc);
        }
    }

    fn spill_register(&mut self, code: &mut BlockOfCode, loc: HostLoc) {
        assert!(loc.is_register(), "only registers can be spilled");
        let target = self.find_free_spill();
        self.do_move(code, target, loc);
    }

    fn find_free_spill(&self) -> HostLoc {
        for i in 0..crate::hostloc::SPILL_COUNT {
            let loc = HostLoc::Spill(i as u8);
            if self.loc_info(loc).is_empty() {
                return loc;
            }
        }
        panic!("all spill slots are full");
    }

    /// Width-aware data movement between host locations.
    fn emit_move(&mut self, code: &mut BlockOfCode, to: HostLoc, from: HostLoc) {
        let width = self.loc_info(from).max_bit_width;
        match (to, from) {
            (HostLoc::Gpr(d), HostLoc::Gpr(s)) => emit_mov_rr(code, true, d, s),
            (HostLoc::Xmm(d), HostLoc::Xmm(s)) => emit_movaps_rr(code, d, s),
            (HostLoc::Gpr(d), HostLoc::Xmm(s)) => {
                assert!(width <= 64);
                emit_movd_from_xmm(code, width > 32, d, s);
            }
            (HostLoc::Xmm(d), HostLoc::Gpr(s)) => {
                assert!(width <= 64);
                emit_movd_to_xmm(code, width > 32, d, s);
            }
            (HostLoc::Gpr(d), HostLoc::Spill(slot)) => {
                assert!(width <= 64);
                emit_load(code, true, d, Gpr::R15, jitstate::offset_spill(slot as usize));
            }
            (HostLoc::Spill(slot), HostLoc::Gpr(s)) => {
                emit_store(code, true, s, Gpr::R15, jitstate::offset_spill(slot as usize));
            }
            (HostLoc::Xmm(d), HostLoc::Spill(slot)) => {
                let disp = jitstate::offset_spill(slot as usize);
                if width <= 32 {
                    emit_movss_load(code, d, Gpr::R15, disp);
                } else if width <= 64 {
                    emit_movsd_load(code, d, Gpr::R15, disp);
                } else {
                    emit_movaps_load(code, d, Gpr::R15, disp);
                }
            }
            (HostLoc::Spill(slot), HostLoc::Xmm(s)) => {
                let disp = jitstate::offset_spill(slot as usize);
                if width <= 32 {
                    emit_movss_store(code, s, Gpr::R15, disp);
                } else if width <= 64 {
                    emit_movsd_store(code, s, Gpr::R15, disp);
                } else {
                    emit_movaps_store(code, s, Gpr::R15, disp);
                }
            }
            _ => panic!("invalid move {from:?} -> {to:?}"),
        }
    }
}
