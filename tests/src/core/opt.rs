use dbt_ir::block::Terminal;
use dbt_ir::opt::{self, NoRomInfo, ReadOnlyMemory};
use dbt_ir::{A32Reg, IrEmitter, LocationDescriptor, Opcode, Value};

fn emitter() -> IrEmitter {
    IrEmitter::new(LocationDescriptor::a32(0x1000, false, false, 0, 0))
}

fn count_op(block: &dbt_ir::Block, op: Opcode) -> usize {
    block
        .indices()
        .filter(|&idx| block.inst(idx).op == op)
        .count()
}

#[test]
fn get_after_set_is_forwarded() {
    let mut ir = emitter();
    let v = ir.imm32(7);
    ir.set_register(A32Reg::R0, v);
    let read = ir.get_register(A32Reg::R0);
    ir.set_register(A32Reg::R1, read);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::get_set_elimination(&mut block);
    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::A32GetRegister), 0);
    // The second set now stores the immediate directly.
    let set = block
        .indices()
        .filter(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .nth(1)
        .unwrap();
    assert_eq!(block.inst(set).arg(1), Value::ImmU32(7));
}

#[test]
fn shadowed_set_is_removed() {
    let mut ir = emitter();
    let a = ir.imm32(1);
    ir.set_register(A32Reg::R0, a);
    let b = ir.imm32(2);
    ir.set_register(A32Reg::R0, b);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::get_set_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::A32SetRegister), 1);
}

#[test]
fn memory_access_is_a_barrier() {
    let mut ir = emitter();
    let a = ir.imm32(1);
    ir.set_register(A32Reg::R0, a);
    let addr = ir.imm32(0x4000);
    ir.read_memory_32(addr);
    let b = ir.imm32(2);
    ir.set_register(A32Reg::R0, b);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::get_set_elimination(&mut block);
    opt::verification_pass(&block);

    // The callback may observe R0; both stores must survive.
    assert_eq!(count_op(&block, Opcode::A32SetRegister), 2);
}

#[test]
fn constant_arithmetic_folds() {
    let mut ir = emitter();
    let a = ir.imm32(20);
    let b = ir.imm32(22);
    let sum = ir.add(a, b);
    ir.set_register(A32Reg::R0, sum);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::constant_propagation(&mut block, &NoRomInfo);
    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::Add32), 0);
    let set = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block.inst(set).arg(1), Value::ImmU32(42));
}

#[test]
fn shift_folds_with_carry_companion() {
    let mut ir = emitter();
    let value = ir.imm32(0xFFFF_FFFF);
    let amount = ir.imm8(31);
    let carry_in = ir.imm1(false);
    let shifted = ir.logical_shift_left(value, amount, carry_in);
    ir.set_register(A32Reg::R0, shifted.result);
    ir.set_c_flag(shifted.carry);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::constant_propagation(&mut block, &NoRomInfo);
    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::LogicalShiftLeft32), 0);
    assert_eq!(count_op(&block, Opcode::GetCarryFromOp), 0);
    let set_c = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::SetCFlag)
        .unwrap();
    assert_eq!(block.inst(set_c).arg(0), Value::ImmU1(true));
}

struct FixedRom;

impl ReadOnlyMemory for FixedRom {
    fn read_const(&self, vaddr: u64, size_bytes: usize) -> Option<u64> {
        (vaddr == 0x9000 && size_bytes == 4).then_some(0xCAFE_F00D)
    }
}

#[test]
fn read_only_memory_load_folds() {
    let mut ir = emitter();
    let addr = ir.imm32(0x9000);
    let data = ir.read_memory_32(addr);
    ir.set_register(A32Reg::R0, data);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::constant_propagation(&mut block, &FixedRom);
    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::ReadMemory32), 0);
    let set = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::A32SetRegister)
        .unwrap();
    assert_eq!(block.inst(set).arg(1), Value::ImmU32(0xCAFE_F00D));
}

#[test]
fn mutable_memory_load_survives() {
    let mut ir = emitter();
    let addr = ir.imm32(0x8000);
    let data = ir.read_memory_32(addr);
    ir.set_register(A32Reg::R0, data);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::constant_propagation(&mut block, &FixedRom);
    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::ReadMemory32), 1);
}

#[test]
fn dce_removes_unused_pure_values() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let _unused = ir.add(a, b);
    let addr = ir.imm32(0x4000);
    let store = ir.get_register(A32Reg::R2);
    ir.write_memory_32(addr, store);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::Add32), 0);
    assert_eq!(count_op(&block, Opcode::A32GetRegister), 1);
    assert_eq!(count_op(&block, Opcode::WriteMemory32), 1);
}

#[test]
fn dce_sweeps_unused_companions() {
    let mut ir = emitter();
    let value = ir.get_register(A32Reg::R1);
    let amount = ir.imm8(2);
    let carry_in = ir.get_c_flag();
    let shifted = ir.logical_shift_left(value, amount, carry_in);
    // Only the result is consumed; the carry companion is dead.
    ir.set_register(A32Reg::R0, shifted.result);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::dead_code_elimination(&mut block);
    opt::verification_pass(&block);

    assert_eq!(count_op(&block, Opcode::GetCarryFromOp), 0);
    let shift = block
        .indices()
        .find(|&i| block.inst(i).op == Opcode::LogicalShiftLeft32)
        .unwrap();
    assert_eq!(block.inst(shift).carry_inst, None);
}

#[test]
fn standard_pipeline_runs_clean() {
    let mut ir = emitter();
    let a = ir.get_register(A32Reg::R1);
    let two = ir.imm8(2);
    let carry = ir.get_c_flag();
    let shifted = ir.logical_shift_left(a, two, carry);
    ir.set_register(A32Reg::R0, shifted.result);
    ir.set_nzc_from_result(shifted.result, shifted.carry);
    ir.set_term(Terminal::ReturnToDispatch);
    let mut block = ir.block;

    opt::run_standard_passes(&mut block, &NoRomInfo);
    opt::verification_pass(&block);
    assert!(block.has_terminal());
}
