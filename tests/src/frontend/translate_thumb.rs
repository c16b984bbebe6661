use dbt_frontend::{translate, TranslationOptions};
use dbt_ir::block::Terminal;
use dbt_ir::{Cond, LocationDescriptor, Opcode};

use super::CodeMem;

fn thumb_at(pc: u32) -> LocationDescriptor {
    LocationDescriptor::a32(pc, true, false, 0, 0)
}

fn count_op(block: &dbt_ir::Block, op: Opcode) -> usize {
    block
        .indices()
        .filter(|&idx| block.inst(idx).op == op)
        .count()
}

#[test]
fn lsls_sets_flags() {
    // lsls r0, r1, #2; b .
    let mut mem = CodeMem::from_halfwords(0x1000, &[0x0088, 0xE7FE]);
    let block = translate(thumb_at(0x1000), &mut mem, TranslationOptions::default());

    assert_eq!(block.cycle_count(), 2);
    assert_eq!(count_op(&block, Opcode::LogicalShiftLeft32), 1);
    assert_eq!(count_op(&block, Opcode::SetNFlag), 1);
    assert_eq!(count_op(&block, Opcode::SetZFlag), 1);
    assert_eq!(count_op(&block, Opcode::SetCFlag), 1);
    assert_eq!(count_op(&block, Opcode::SetVFlag), 0);
}

#[test]
fn instruction_sizes_advance_the_pc() {
    // movs r0, #1; movs r1, #2; b .
    let mut mem = CodeMem::from_halfwords(0x1000, &[0x2001, 0x2102, 0xE7FE]);
    let block = translate(thumb_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.cycle_count(), 3);
    assert_eq!(block.end_location().pc(), 0x1006);
    assert_eq!(block.guest_range(), (0x1000, 0x1006));
}

#[test]
fn conditional_branch_uses_the_if_terminal() {
    // beq +2 at 0x1000: then = 0x1008, else = 0x1002.
    let mut mem = CodeMem::from_halfwords(0x1000, &[0xD001]);
    let block = translate(thumb_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(
        *block.terminal(),
        Terminal::If {
            cond: Cond::EQ,
            then_: Box::new(Terminal::LinkBlock(thumb_at(0x1008))),
            else_: Box::new(Terminal::LinkBlock(thumb_at(0x1002))),
        }
    );
}

#[test]
fn thumb32_bl_is_one_instruction() {
    // bl +4: hw1 = 0xF000, hw2 = 0xF802.
    let mut mem = CodeMem::from_halfwords(0x1000, &[0xF000, 0xF802]);
    let block = translate(thumb_at(0x1000), &mut mem, TranslationOptions::default());

    assert_eq!(block.cycle_count(), 1);
    assert_eq!(count_op(&block, Opcode::PushRSB), 1);
    // LR holds the return address with the Thumb bit set.
    let set_lr = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block.inst(set_lr).arg(1), dbt_ir::Value::ImmU32(0x1005));
    assert_eq!(*block.terminal(), Terminal::LinkBlock(thumb_at(0x1008)));
}

#[test]
fn pop_pc_predicts_a_return() {
    // pop {pc}
    let mut mem = CodeMem::from_halfwords(0x1000, &[0xBD00]);
    let block = translate(thumb_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(*block.terminal(), Terminal::PopRSBHint);
}

#[test]
fn halfword_fetch_is_position_correct() {
    // Starting mid-word must pick the upper halfword: place
    // movs r0, #7 at 0x1002.
    let mut mem = CodeMem::from_halfwords(0x1000, &[0x46C0, 0x2007, 0xE7FE, 0x0000]);
    let block = translate(thumb_at(0x1002), &mut mem, TranslationOptions::default());
    let set = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block.inst(set).arg(1), dbt_ir::Value::ImmU32(7));
}
