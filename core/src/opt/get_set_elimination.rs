//! Redundant guest-state access elimination.
//!
//! Within a block, the latest write to a guest register shadows earlier
//! writes to the same register, and a read that follows a write with no
//! intervening barrier is forwarded the written value. Memory accesses
//! and calls are barriers: the callee may observe or mutate any guest
//! state, so all tracking is discarded at those points.

use std::collections::HashMap;

use crate::block::{Block, InstIndex};
use crate::opcode::Opcode;
use crate::types::A32ExtReg;
use crate::value::Value;

#[derive(Default, Clone, Copy)]
struct SlotInfo {
    /// Last value known to be in this guest slot.
    value: Option<Value>,
    /// Pending write that may still be shadowed by a later one.
    last_set: Option<InstIndex>,
}

struct State {
    regs: [SlotInfo; 16],
    ext32: [SlotInfo; 64],
    ext64: [SlotInfo; 32],
    /// N, Z, C, V.
    flags: [SlotInfo; 4],
    a64_x: [SlotInfo; 31],
    a64_sp: SlotInfo,
    a64_vec: [SlotInfo; 32],
}

impl State {
    fn new() -> State {
        let nil = SlotInfo::default();
        State {
            regs: [nil; 16],
            ext32: [nil; 64],
            ext64: [nil; 32],
            flags: [nil; 4],
            a64_x: [nil; 31],
            a64_sp: nil,
            a64_vec: [nil; 32],
        }
    }

    fn reset_all(&mut self) {
        *self = State::new();
    }

    fn reset_flags(&mut self) {
        self.flags = [SlotInfo::default(); 4];
    }
}

const N: usize = 0;
const Z: usize = 1;
const C: usize = 2;
const V: usize = 3;

pub fn get_set_elimination(block: &mut Block) {
    let mut state = State::new();
    let mut subst: HashMap<InstIndex, Value> = HashMap::new();

    for idx in block.indices() {
        // Forward previously folded reads into this instruction's args.
        let nargs = block.inst(idx).num_args();
        for slot in 0..nargs {
            if let Some(src) = block.inst(idx).arg(slot).inst() {
                if let Some(&replacement) = subst.get(&src) {
                    block.replace_arg(idx, slot, replacement);
                }
            }
        }

        let op = block.inst(idx).op;

        if op.is_memory_access() || op.is_call() {
            state.reset_all();
            continue;
        }

        match op {
            Opcode::A32GetRegister => {
                let reg = block.inst(idx).arg(0).imm_a32_reg().index();
                do_get(block, &mut subst, &mut state.regs[reg], idx);
            }
            Opcode::A32SetRegister => {
                let reg = block.inst(idx).arg(0).imm_a32_reg().index();
                let value = block.inst(idx).arg(1);
                do_set(block, &mut state.regs[reg], idx, value);
            }
            Opcode::A32GetExtReg32 => {
                let i = ext_single_index(block, idx);
                do_get(block, &mut subst, &mut state.ext32[i], idx);
            }
            Opcode::A32SetExtReg32 => {
                let i = ext_single_index(block, idx);
                let value = block.inst(idx).arg(1);
                // A write to S(i) clobbers the aliasing D(i/2).
                state.ext64[i / 2] = SlotInfo::default();
                do_set(block, &mut state.ext32[i], idx, value);
            }
            Opcode::A32GetExtReg64 => {
                let i = ext_double_index(block, idx);
                do_get(block, &mut subst, &mut state.ext64[i], idx);
            }
            Opcode::A32SetExtReg64 => {
                let i = ext_double_index(block, idx);
                let value = block.inst(idx).arg(1);
                state.ext32[i * 2] = SlotInfo::default();
                state.ext32[i * 2 + 1] = SlotInfo::default();
                do_set(block, &mut state.ext64[i], idx, value);
            }
            Opcode::GetCFlag => {
                do_get(block, &mut subst, &mut state.flags[C], idx);
            }
            Opcode::SetNFlag => set_flag(block, &mut state, N, idx),
            Opcode::SetZFlag => set_flag(block, &mut state, Z, idx),
            Opcode::SetCFlag => set_flag(block, &mut state, C, idx),
            Opcode::SetVFlag => set_flag(block, &mut state, V, idx),
            // Whole-CPSR accesses overlap the flag slots; treat them as
            // a flag barrier rather than modeling the overlap.
            Opcode::A32GetCpsr | Opcode::A32SetCpsr | Opcode::SetCpsrNzcv => {
                state.reset_flags();
            }
            // Q accesses alias the S/D files; invalidate rather than
            // model the overlap.
            Opcode::A32GetQ | Opcode::A32SetQ => {
                state.ext32 = [SlotInfo::default(); 64];
                state.ext64 = [SlotInfo::default(); 32];
            }
            Opcode::A64GetX => {
                let reg = block.inst(idx).arg(0).imm_a64_reg().index();
                do_get(block, &mut subst, &mut state.a64_x[reg], idx);
            }
            Opcode::A64SetX => {
                let reg = block.inst(idx).arg(0).imm_a64_reg().index();
                let value = block.inst(idx).arg(1);
                do_set(block, &mut state.a64_x[reg], idx, value);
            }
            // W accesses alias the X file; invalidate rather than track.
            Opcode::A64GetW | Opcode::A64SetW => {
                let reg = block.inst(idx).arg(0).imm_a64_reg().index();
                state.a64_x[reg] = SlotInfo::default();
            }
            Opcode::A64GetSP => {
                do_get(block, &mut subst, &mut state.a64_sp, idx);
            }
            Opcode::A64SetSP => {
                let value = block.inst(idx).arg(0);
                do_set(block, &mut state.a64_sp, idx, value);
            }
            Opcode::A64GetVector => {
                let reg = block.inst(idx).arg(0).imm_a64_vec().index();
                do_get(block, &mut subst, &mut state.a64_vec[reg], idx);
            }
            Opcode::A64SetVector => {
                let reg = block.inst(idx).arg(0).imm_a64_vec().index();
                let value = block.inst(idx).arg(1);
                do_set(block, &mut state.a64_vec[reg], idx, value);
            }
            _ => {}
        }
    }
}

fn ext_single_index(block: &Block, idx: InstIndex) -> usize {
    match block.inst(idx).arg(0).imm_a32_ext_reg() {
        A32ExtReg::S(i) => i as usize,
        _ => unreachable!("single-precision access to non-S register"),
    }
}

fn ext_double_index(block: &Block, idx: InstIndex) -> usize {
    match block.inst(idx).arg(0).imm_a32_ext_reg() {
        A32ExtReg::D(i) => i as usize,
        _ => unreachable!("double-precision access to non-D register"),
    }
}

/// A read: forward the known value if there is one, otherwise the read
/// itself becomes the known value of the slot.
fn do_get(
    block: &mut Block,
    subst: &mut HashMap<InstIndex, Value>,
    slot: &mut SlotInfo,
    idx: InstIndex,
) {
    if let Some(known) = slot.value {
        subst.insert(idx, known);
        block.remove(idx);
    } else {
        slot.value = Some(block.inst(idx).value_of(idx));
    }
}

/// A write: shadow any pending earlier write to the same slot.
fn do_set(block: &mut Block, slot: &mut SlotInfo, idx: InstIndex, value: Value) {
    if let Some(prev) = slot.last_set {
        block.remove(prev);
    }
    slot.last_set = Some(idx);
    slot.value = Some(value);
}

fn set_flag(block: &mut Block, state: &mut State, which: usize, idx: InstIndex) {
    let value = block.inst(idx).arg(0);
    do_set(block, &mut state.flags[which], idx, value);
}
