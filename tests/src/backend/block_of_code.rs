use dbt_backend::encoder::*;
use dbt_backend::hostloc::Gpr;

use super::new_code;

#[test]
fn regions_have_independent_cursors() {
    let mut code = new_code();
    code.enable_writing();
    let near_start = code.offset();
    emit_ret(&mut code);
    code.switch_to_far_code();
    let far_start = code.offset();
    emit_ret(&mut code);
    assert!(far_start > near_start);
    code.switch_to_near_code();
    assert_eq!(code.offset(), near_start + 1);
}

#[test]
fn constant_pool_deduplicates() {
    let mut code = new_code();
    code.enable_writing();
    let a = code.mconst(0x1234, 0x5678);
    let b = code.mconst(0x1234, 0x5678);
    let c = code.mconst(0x1234, 0x0000);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(code.pool_len(), 2);
    assert_eq!(code.read_u32(a), 0x1234);
    assert_eq!(code.read_u32(a + 8), 0x5678);
}

#[test]
fn clear_resets_past_the_glue() {
    let mut code = new_code();
    code.enable_writing();
    let begin = code.offset();
    emit_ret(&mut code);
    emit_ret(&mut code);
    code.clear();
    assert_eq!(code.offset(), begin);
}

#[test]
fn patch_location_padding_is_exact() {
    let mut code = new_code();
    code.enable_writing();
    let begin = code.offset();
    emit_mov_rr(&mut code, true, Gpr::Rax, Gpr::Rbx);
    code.ensure_patch_location_size(begin, 16);
    assert_eq!(code.offset() - begin, 16);
}

#[test]
#[should_panic(expected = "patch location too large")]
fn oversized_patch_location_is_a_bug() {
    let mut code = new_code();
    code.enable_writing();
    let begin = code.offset();
    emit_mov_ri(&mut code, true, Gpr::Rax, u64::MAX);
    code.ensure_patch_location_size(begin, 4);
}

#[test]
fn cursor_save_restore_round_trips() {
    let mut code = new_code();
    code.enable_writing();
    emit_ret(&mut code);
    let patch_site = code.offset();
    emit_nops(&mut code, 8);
    let after = code.offset();

    let saved = code.save_cursor();
    code.set_cursor_at(patch_site);
    emit_ret(&mut code);
    code.restore_cursor(saved);
    assert_eq!(code.offset(), after);
    assert_eq!(code.read_u8(patch_site), 0xC3);
}

#[test]
fn host_features_are_queryable() {
    let code = new_code();
    // Just exercise detection; any x86-64 machine this runs on has
    // SSE2 baseline, and the bitset must be stable across calls.
    let a = code.host_features();
    let b = code.host_features();
    assert_eq!(a, b);
}
