use dbt_backend::encoder::*;
use dbt_backend::hostloc::{Gpr, Xmm};

use super::new_code;

/// Emit through `f` and return the produced bytes.
fn emitted(f: impl FnOnce(&mut dbt_backend::BlockOfCode)) -> Vec<u8> {
    let mut code = new_code();
    code.enable_writing();
    let start = code.offset();
    f(&mut code);
    let len = code.offset() - start;
    code.slice(start, len).to_vec()
}

#[test]
fn mov_register_forms() {
    assert_eq!(
        emitted(|c| emit_mov_rr(c, true, Gpr::Rax, Gpr::Rbx)),
        [0x48, 0x89, 0xD8]
    );
    assert_eq!(
        emitted(|c| emit_mov_rr(c, false, Gpr::Rcx, Gpr::Rdx)),
        [0x89, 0xD1]
    );
    assert_eq!(
        emitted(|c| emit_mov_rr(c, true, Gpr::R8, Gpr::R15)),
        [0x4D, 0x89, 0xF8]
    );
}

#[test]
fn mov_immediate_selects_the_shortest_form() {
    // Zero becomes xor.
    assert_eq!(
        emitted(|c| emit_mov_ri(c, false, Gpr::Rax, 0)),
        [0x31, 0xC0]
    );
    // 32-bit payload.
    assert_eq!(
        emitted(|c| emit_mov_ri(c, false, Gpr::Rcx, 0x1234_5678)),
        [0xB9, 0x78, 0x56, 0x34, 0x12]
    );
    // Full 64-bit payload.
    assert_eq!(
        emitted(|c| emit_mov_ri(c, true, Gpr::Rcx, 0x1122_3344_5566_7788)),
        [0x48, 0xB9, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}

#[test]
fn arithmetic_forms() {
    // add rax, rbx (GvEv form).
    assert_eq!(
        emitted(|c| emit_arith_rr(c, ArithOp::Add, true, Gpr::Rax, Gpr::Rbx)),
        [0x48, 0x03, 0xC3]
    );
    // sub ecx, 8 (imm8 form).
    assert_eq!(
        emitted(|c| emit_arith_ri(c, ArithOp::Sub, false, Gpr::Rcx, 8)),
        [0x83, 0xE9, 0x08]
    );
    // cmp rdx, 0x1000 (imm32 form).
    assert_eq!(
        emitted(|c| emit_arith_ri(c, ArithOp::Cmp, true, Gpr::Rdx, 0x1000)),
        [0x48, 0x81, 0xFA, 0x00, 0x10, 0x00, 0x00]
    );
}

#[test]
fn memory_forms_handle_special_bases() {
    // mov edx, [r15 + 0x40]: disp8.
    assert_eq!(
        emitted(|c| emit_load(c, false, Gpr::Rdx, Gpr::R15, 0x40)),
        [0x41, 0x8B, 0x57, 0x40]
    );
    // mov eax, [rsp]: needs a SIB byte.
    assert_eq!(
        emitted(|c| emit_load(c, false, Gpr::Rax, Gpr::Rsp, 0)),
        [0x8B, 0x04, 0x24]
    );
    // mov eax, [rbp]: mod 00 with rbp means RIP, so disp8 is forced.
    assert_eq!(
        emitted(|c| emit_load(c, false, Gpr::Rax, Gpr::Rbp, 0)),
        [0x8B, 0x45, 0x00]
    );
    // mov [r15 + 0x200], rax: disp32.
    assert_eq!(
        emitted(|c| emit_store(c, true, Gpr::Rax, Gpr::R15, 0x200)),
        [0x49, 0x89, 0x87, 0x00, 0x02, 0x00, 0x00]
    );
}

#[test]
fn setcc_and_byte_registers() {
    // sete bl.
    assert_eq!(emitted(|c| emit_setcc(c, Cc::E, Gpr::Rbx)), [0x0F, 0x94, 0xC3]);
    // setc sil needs an empty REX prefix.
    assert_eq!(
        emitted(|c| emit_setcc(c, Cc::B, Gpr::Rsi)),
        [0x40, 0x0F, 0x92, 0xC6]
    );
}

#[test]
fn push_pop_and_extended_registers() {
    assert_eq!(emitted(|c| emit_push(c, Gpr::Rbx)), [0x53]);
    assert_eq!(emitted(|c| emit_push(c, Gpr::R12)), [0x41, 0x54]);
    assert_eq!(emitted(|c| emit_pop(c, Gpr::R12)), [0x41, 0x5C]);
}

#[test]
fn shifts_and_bswap() {
    // shl eax, 1 uses the short form.
    assert_eq!(
        emitted(|c| emit_shift_ri(c, ShiftOp::Shl, false, Gpr::Rax, 1)),
        [0xD1, 0xE0]
    );
    // shr rcx, 12.
    assert_eq!(
        emitted(|c| emit_shift_ri(c, ShiftOp::Shr, true, Gpr::Rcx, 12)),
        [0x48, 0xC1, 0xE9, 0x0C]
    );
    // sar edx, cl.
    assert_eq!(
        emitted(|c| emit_shift_cl(c, ShiftOp::Sar, false, Gpr::Rdx)),
        [0xD3, 0xFA]
    );
    // bswap eax.
    assert_eq!(emitted(|c| emit_bswap(c, false, Gpr::Rax)), [0x0F, 0xC8]);
    // bswap r9.
    assert_eq!(
        emitted(|c| emit_bswap(c, true, Gpr::R9)),
        [0x49, 0x0F, 0xC9]
    );
}

#[test]
fn sse_forms() {
    // paddb xmm1, xmm2.
    assert_eq!(
        emitted(|c| emit_sse_rr(c, OPC_PADDB, Xmm::Xmm1, Xmm::Xmm2)),
        [0x66, 0x0F, 0xFC, 0xCA]
    );
    // pxor xmm3, xmm3.
    assert_eq!(
        emitted(|c| emit_sse_rr(c, OPC_PXOR, Xmm::Xmm3, Xmm::Xmm3)),
        [0x66, 0x0F, 0xEF, 0xDB]
    );
    // addsd xmm0, xmm1.
    assert_eq!(
        emitted(|c| emit_sse_rr(c, OPC_ADDSD, Xmm::Xmm0, Xmm::Xmm1)),
        [0xF2, 0x0F, 0x58, 0xC1]
    );
    // movd xmm0, eax / movq rax, xmm0.
    assert_eq!(
        emitted(|c| emit_movd_to_xmm(c, false, Xmm::Xmm0, Gpr::Rax)),
        [0x66, 0x0F, 0x6E, 0xC0]
    );
    assert_eq!(
        emitted(|c| emit_movd_from_xmm(c, true, Gpr::Rax, Xmm::Xmm0)),
        [0x66, 0x48, 0x0F, 0x7E, 0xC0]
    );
    // pabsb xmm0, xmm1 (0F 38 escape).
    assert_eq!(
        emitted(|c| emit_sse_rr(c, OPC_PABSB, Xmm::Xmm0, Xmm::Xmm1)),
        [0x66, 0x0F, 0x38, 0x1C, 0xC1]
    );
}

#[test]
fn forward_jumps_resolve() {
    let bytes = emitted(|c| {
        let skip = emit_jcc_forward(c, Cc::E);
        emit_mov_ri(c, false, Gpr::Rax, 1);
        resolve_forward(c, skip);
        emit_ret(c);
    });
    // jz +5 over the 5-byte mov.
    assert_eq!(bytes[0], 0x0F);
    assert_eq!(bytes[1], 0x84);
    assert_eq!(&bytes[2..6], [5, 0, 0, 0]);
    assert_eq!(*bytes.last().unwrap(), 0xC3);
}

#[test]
fn nops_cover_every_length() {
    for n in 1..=16 {
        let bytes = emitted(|c| emit_nops(c, n));
        assert_eq!(bytes.len(), n);
    }
}
