use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, IrEmitter, LocationDescriptor, Opcode};

fn emitter() -> IrEmitter {
    IrEmitter::new(LocationDescriptor::a32(0x1000, false, false, 0, 0))
}

#[test]
fn use_counts_are_exact() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let sum = ir.add(a, b);
    ir.set_register(A32Reg::R2, sum);

    let a_idx = a.inst().unwrap();
    let sum_idx = sum.inst().unwrap();
    assert_eq!(ir.block.inst(a_idx).use_count(), 1);
    assert_eq!(ir.block.inst(sum_idx).use_count(), 1);

    // A second use of the same value bumps the count.
    ir.set_register(A32Reg::R3, sum);
    assert_eq!(ir.block.inst(sum_idx).use_count(), 2);
}

#[test]
fn companions_attach_once() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let sum = ir.add(a, b);
    let c1 = ir.carry_from(sum);
    let c2 = ir.carry_from(sum);
    assert_eq!(c1, c2);

    let sum_idx = sum.inst().unwrap();
    assert_eq!(ir.block.inst(sum_idx).carry_inst, c1.inst());
    // The companion references its producer.
    assert_eq!(ir.block.inst(sum_idx).use_count(), 1);
}

#[test]
fn remove_releases_operands_and_links() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let sum = ir.add(a, b);
    let carry = ir.carry_from(sum);

    let sum_idx = sum.inst().unwrap();
    let carry_idx = carry.inst().unwrap();
    ir.block.remove(carry_idx);

    assert_eq!(ir.block.inst(carry_idx).op, Opcode::Void);
    assert_eq!(ir.block.inst(sum_idx).use_count(), 0);
    assert_eq!(ir.block.inst(sum_idx).carry_inst, None);
}

#[test]
fn replace_arg_adjusts_use_counts() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let sum = ir.add(a, b);
    let sum_idx = sum.inst().unwrap();
    let b_idx = b.inst().unwrap();

    ir.block
        .replace_arg(sum_idx, 1, dbt_ir::Value::ImmU32(42));
    assert_eq!(ir.block.inst(b_idx).use_count(), 0);
    assert_eq!(ir.block.inst(sum_idx).arg(1), dbt_ir::Value::ImmU32(42));
}

#[test]
#[should_panic(expected = "already has a terminal")]
fn double_terminal_is_rejected() {
    let mut ir = emitter();
    ir.set_term(Terminal::ReturnToDispatch);
    ir.set_term(Terminal::ReturnToDispatch);
}

#[test]
#[should_panic(expected = "arg 1 has type")]
fn operand_type_mismatch_is_rejected() {
    let mut ir = emitter();
    let wide = ir.imm64(1);
    // SetRegister expects a U32 operand.
    ir.set_register(A32Reg::R0, wide);
}

#[test]
fn guest_range_tracks_code_reads() {
    let mut ir = emitter();
    ir.block.record_code_read(0x1000, 4);
    ir.block.record_code_read(0x1004, 4);
    assert_eq!(ir.block.guest_range(), (0x1000, 0x1008));
}
