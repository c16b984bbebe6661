use dbt_frontend::{translate, TranslationOptions};
use dbt_ir::block::Terminal;
use dbt_ir::{LocationDescriptor, Opcode};

use super::CodeMem;

fn a32_at(pc: u32) -> LocationDescriptor {
    LocationDescriptor::a32(pc, false, false, 0, 0)
}

fn count_op(block: &dbt_ir::Block, op: Opcode) -> usize {
    block
        .indices()
        .filter(|&idx| block.inst(idx).op == op)
        .count()
}

#[test]
fn unconditional_branch_links_fast() {
    // b +8 at 0x1000: target is pc + 8 (prefetch) + 8.
    let mut mem = CodeMem::new(0x1000, &[0xEA00_0002]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());

    assert_eq!(block.cycle_count(), 1);
    assert_eq!(*block.terminal(), Terminal::LinkBlockFast(a32_at(0x1010)));
    // No IR side effects besides the terminator.
    assert!(block.is_empty());
}

#[test]
fn conditional_branch_keeps_cycle_check() {
    // beq +0 at 0x1000.
    let mut mem = CodeMem::new(0x1000, &[0x0A00_0000]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.condition(), dbt_ir::Cond::EQ);
    assert_eq!(*block.terminal(), Terminal::LinkBlock(a32_at(0x1008)));
    assert_eq!(block.condition_failed_location(), Some(a32_at(0x1004)));
}

#[test]
fn straight_line_block_accumulates_cycles() {
    // add r0, r0, #1; add r1, r1, #2; b .
    let mut mem = CodeMem::new(
        0x1000,
        &[0xE280_0001, 0xE281_1002, 0xEAFF_FFFC],
    );
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.cycle_count(), 3);
    assert_eq!(mem.code_reads, 3);
    assert_eq!(mem.hook_fires, 3);
    assert_eq!(block.guest_range(), (0x1000, 0x100C));
}

#[test]
fn conditional_run_shares_entry_condition() {
    // moveq r0, #1; addeq r1, r1, #1; b . The two EQ instructions
    // share the block's entry condition.
    let mut mem = CodeMem::new(
        0x1000,
        &[0x03A0_0001, 0x0281_1001, 0xEAFF_FFFC],
    );
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.condition(), dbt_ir::Cond::EQ);
    assert_eq!(block.cycle_count(), 3);
    assert_eq!(block.condition_failed_location(), Some(a32_at(0x1008)));
    assert_eq!(block.condition_failed_cycle_count(), 2);
}

#[test]
fn condition_change_cuts_the_block() {
    // moveq r0, #1; movne r0, #2. The NE instruction must start a
    // new block.
    let mut mem = CodeMem::new(0x1000, &[0x03A0_0001, 0x13A0_0002]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.condition(), dbt_ir::Cond::EQ);
    assert_eq!(block.cycle_count(), 1);
    assert_eq!(*block.terminal(), Terminal::LinkBlockFast(a32_at(0x1004)));
}

#[test]
fn conditional_after_unconditional_cuts_the_block() {
    // mov r0, #1; moveq r1, #2.
    let mut mem = CodeMem::new(0x1000, &[0xE3A0_0001, 0x03A0_1002]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(block.condition(), dbt_ir::Cond::AL);
    assert_eq!(block.cycle_count(), 1);
    assert_eq!(*block.terminal(), Terminal::LinkBlockFast(a32_at(0x1004)));
}

#[test]
fn swp_reads_then_writes() {
    // swp r2, r0, [r1]; b .
    let mut mem = CodeMem::new(0x1000, &[0xE101_2090, 0xEAFF_FFFD]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());

    assert_eq!(count_op(&block, Opcode::ReadMemory32), 1);
    assert_eq!(count_op(&block, Opcode::WriteMemory32), 1);
    let read = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::ReadMemory32)
        .unwrap();
    let write = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::WriteMemory32)
        .unwrap();
    assert!(read < write, "the old value must be read before the store");
}

#[test]
fn svc_checks_halt_then_links() {
    let mut mem = CodeMem::new(0x1000, &[0xEF00_002A]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::CallSupervisor), 1);
    assert_eq!(
        *block.terminal(),
        Terminal::CheckHalt(Box::new(Terminal::LinkBlock(a32_at(0x1004))))
    );
}

#[test]
fn bl_pushes_the_rsb() {
    let mut mem = CodeMem::new(0x1000, &[0xEB00_0010]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::PushRSB), 1);
    // LR <- return address.
    let set_lr = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block.inst(set_lr).arg(1), dbt_ir::Value::ImmU32(0x1004));
}

#[test]
fn bx_lr_pops_the_rsb() {
    let mut mem = CodeMem::new(0x1000, &[0xE12F_FF1E]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(*block.terminal(), Terminal::PopRSBHint);
}

#[test]
fn undefined_instruction_raises() {
    let mut mem = CodeMem::new(0x1000, &[0xE7F0_00F0]);
    let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::ExceptionRaised), 1);
    assert_eq!(
        *block.terminal(),
        Terminal::CheckHalt(Box::new(Terminal::ReturnToDispatch))
    );
}

#[test]
fn single_step_stops_after_one_instruction() {
    let mut mem = CodeMem::new(0x1000, &[0xE280_0001, 0xE280_0001]);
    let options = TranslationOptions { single_step: true };
    let block = translate(a32_at(0x1000), &mut mem, options);
    assert_eq!(block.cycle_count(), 1);
    assert_eq!(*block.terminal(), Terminal::LinkBlock(a32_at(0x1004)));
}

#[test]
fn every_block_has_a_terminal() {
    for word in [0xE280_0001u32, 0xEA00_0000, 0xE12F_FF1E, 0xEF00_0000, 0x0000_0000] {
        let mut mem = CodeMem::new(0x1000, &[word, 0xEAFF_FFFD]);
        let block = translate(a32_at(0x1000), &mut mem, TranslationOptions::default());
        assert!(block.has_terminal(), "no terminal for {word:#010x}");
    }
}
