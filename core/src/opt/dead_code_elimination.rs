//! Dead-code elimination.
//!
//! A single reverse pass suffices: removing an instruction can only
//! zero the use counts of instructions that appear earlier in program
//! order, and those are visited afterwards.

use crate::block::Block;
use crate::opcode::Opcode;

pub fn dead_code_elimination(block: &mut Block) {
    for idx in block.indices().rev() {
        let inst = block.inst(idx);
        if inst.op == Opcode::Void {
            continue;
        }
        if inst.use_count() == 0 && !inst.op.has_side_effects() {
            block.remove(idx);
        }
    }
}
