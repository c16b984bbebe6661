use dbt_frontend::{translate, TranslationOptions};
use dbt_ir::block::Terminal;
use dbt_ir::{Cond, LocationDescriptor, Opcode};

use super::CodeMem;

fn a64_at(pc: u64) -> LocationDescriptor {
    LocationDescriptor::a64(pc, 0)
}

fn count_op(block: &dbt_ir::Block, op: Opcode) -> usize {
    block
        .indices()
        .filter(|&idx| block.inst(idx).op == op)
        .count()
}

#[test]
fn movz_add_sequence() {
    // movz x0, #5; add x0, x0, #7; b .
    let mut mem = CodeMem::new(
        0x4000,
        &[0xD280_00A0, 0x9100_1C00, 0x1400_0000],
    );
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(block.cycle_count(), 3);
    assert_eq!(count_op(&block, Opcode::A64SetX), 2);
    assert_eq!(count_op(&block, Opcode::Add64), 1);
}

#[test]
fn adds_materializes_nzcv() {
    // adds w0, w1, #1; b .
    let mut mem = CodeMem::new(0x4000, &[0x3100_0420, 0x1400_0000]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::GetNzcvFromOp), 1);
    assert_eq!(count_op(&block, Opcode::SetCpsrNzcv), 1);
}

#[test]
fn writes_to_xzr_are_discarded() {
    // add xzr, x0, #1; b .
    let mut mem = CodeMem::new(0x4000, &[0x9100_041F, 0x1400_0000]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    // The ADD's destination is register 31 without flags: SP.
    assert_eq!(count_op(&block, Opcode::A64SetSP), 1);

    // With flags (cmn x0, #1 == adds xzr, x0, #1) the write drops.
    let mut mem = CodeMem::new(0x4000, &[0xB100_041F, 0x1400_0000]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::A64SetX), 0);
    assert_eq!(count_op(&block, Opcode::A64SetSP), 0);
    assert_eq!(count_op(&block, Opcode::SetCpsrNzcv), 1);
}

#[test]
fn b_cond_uses_the_if_terminal() {
    // b.ne +8
    let mut mem = CodeMem::new(0x4000, &[0x5400_0041]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(
        *block.terminal(),
        Terminal::If {
            cond: Cond::NE,
            then_: Box::new(Terminal::LinkBlock(a64_at(0x4008))),
            else_: Box::new(Terminal::LinkBlock(a64_at(0x4004))),
        }
    );
}

#[test]
fn cbz_uses_the_check_bit_terminal() {
    // cbz x3, +16
    let mut mem = CodeMem::new(0x4000, &[0xB400_0083]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::SetCheckBit), 1);
    assert_eq!(count_op(&block, Opcode::IsZero64), 1);
    assert_eq!(
        *block.terminal(),
        Terminal::CheckBit {
            then_: Box::new(Terminal::LinkBlock(a64_at(0x4010))),
            else_: Box::new(Terminal::LinkBlock(a64_at(0x4004))),
        }
    );
}

#[test]
fn ret_pops_the_rsb() {
    // ret (x30)
    let mut mem = CodeMem::new(0x4000, &[0xD65F_03C0]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::A64SetPC), 1);
    assert_eq!(*block.terminal(), Terminal::PopRSBHint);
}

#[test]
fn bl_pushes_the_rsb_and_sets_lr() {
    // bl +16
    let mut mem = CodeMem::new(0x4000, &[0x9400_0004]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::PushRSB), 1);
    let set_lr = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A64SetX)
        .unwrap();
    assert_eq!(block.inst(set_lr).arg(1), dbt_ir::Value::ImmU64(0x4004));
    assert_eq!(*block.terminal(), Terminal::LinkBlock(a64_at(0x4010)));
}

#[test]
fn ldr_str_lower_to_memory_ops() {
    // ldr x1, [x0]; str w2, [x0, #4]; b .
    let mut mem = CodeMem::new(
        0x4000,
        &[0xF940_0001, 0xB900_0402, 0x1400_0000],
    );
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::ReadMemory64), 1);
    assert_eq!(count_op(&block, Opcode::WriteMemory32), 1);
}

#[test]
fn brk_raises_an_exception() {
    let mut mem = CodeMem::new(0x4000, &[0xD420_0000]);
    let block = translate(a64_at(0x4000), &mut mem, TranslationOptions::default());
    assert_eq!(count_op(&block, Opcode::ExceptionRaised), 1);
}
