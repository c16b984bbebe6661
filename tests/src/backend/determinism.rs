use dbt_backend::EmitX64;
use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, IrEmitter, LocationDescriptor};

use super::{dummy_thunks, new_code};

fn build_block() -> dbt_ir::Block {
    let mut ir = IrEmitter::new(LocationDescriptor::a32(0x1000, false, false, 0, 0));
    let a = ir.get_register(A32Reg::R0);
    let b = ir.get_register(A32Reg::R1);
    let sum = ir.add(a, b);
    let two = ir.imm8(2);
    let carry_in = ir.get_c_flag();
    let shifted = ir.logical_shift_left(sum, two, carry_in);
    ir.set_register(A32Reg::R2, shifted.result);
    ir.set_nzc_from_result(shifted.result, shifted.carry);
    let c = ir.get_register(A32Reg::R3);
    let product = ir.mul(sum, c);
    ir.set_register(A32Reg::R4, product);
    ir.set_term(Terminal::ReturnToDispatch);
    ir.block.add_cycle();
    ir.block
}

fn emit_once() -> Vec<u8> {
    let mut emitter = EmitX64::new(new_code(), dummy_thunks());
    emitter.set_ctx(1usize as *mut _);
    let block = build_block();
    let descriptor = emitter.emit(&block).expect("emission failed");
    emitter
        .code
        .slice(descriptor.entrypoint, descriptor.size)
        .to_vec()
}

#[test]
fn register_allocation_is_deterministic() {
    let first = emit_once();
    let second = emit_once();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn emitted_blocks_are_cached_once() {
    let mut emitter = EmitX64::new(new_code(), dummy_thunks());
    emitter.set_ctx(1usize as *mut _);
    let block = build_block();
    let descriptor = emitter.emit(&block).expect("emission failed");
    assert_eq!(
        emitter
            .get_basic_block(block.location())
            .map(|b| b.entrypoint),
        Some(descriptor.entrypoint)
    );
    assert_eq!(emitter.block_count(), 1);
}

#[test]
fn clear_cache_forgets_blocks() {
    let mut emitter = EmitX64::new(new_code(), dummy_thunks());
    emitter.set_ctx(1usize as *mut _);
    let block = build_block();
    emitter.emit(&block).expect("emission failed");
    emitter.clear_cache();
    assert!(emitter.get_basic_block(block.location()).is_none());
    assert_eq!(emitter.block_count(), 0);
}
