#![allow(non_upper_case_globals)]

//! Raw x86-64 instruction encoding.
//!
//! Opcode constants carry prefix flags in their upper bits (`P_*`);
//! `emit_opc` peels them off into the right prefix bytes. Register
//! operands use the [`Gpr`]/[`Xmm`] enums; memory operands are
//! `[base + disp]`, `[base + index + disp]` or RIP-relative.

use crate::block_of_code::BlockOfCode;
use crate::hostloc::{Gpr, Xmm};

// -- Prefix flags --

pub const P_EXT: u32 = 0x100; // 0x0F escape
pub const P_EXT38: u32 = 0x200; // 0x0F 0x38 escape
pub const P_DATA16: u32 = 0x400; // 0x66 operand-size prefix
pub const P_REXW: u32 = 0x1000; // REX.W
pub const P_REXB_R: u32 = 0x2000; // reg field is a byte register
pub const P_REXB_RM: u32 = 0x4000; // r/m field is a byte register
pub const P_SIMDF3: u32 = 0x20000; // 0xF3 prefix
pub const P_SIMDF2: u32 = 0x40000; // 0xF2 prefix

// -- Opcode constants --

pub const OPC_ARITH_EvIb: u32 = 0x83;
pub const OPC_ARITH_EvIz: u32 = 0x81;
pub const OPC_ARITH_GvEv: u32 = 0x03;
pub const OPC_ARITH_EvGv: u32 = 0x01;

pub const OPC_SHIFT_1: u32 = 0xD1;
pub const OPC_SHIFT_Ib: u32 = 0xC1;
pub const OPC_SHIFT_cl: u32 = 0xD3;

pub const OPC_MOVB_EvGv: u32 = 0x88;
pub const OPC_MOVL_EvGv: u32 = 0x89;
pub const OPC_MOVL_GvEv: u32 = 0x8B;
pub const OPC_MOVL_EvIz: u32 = 0xC7;
pub const OPC_MOVL_Iv: u32 = 0xB8;

pub const OPC_MOVZBL: u32 = 0xB6 | P_EXT;
pub const OPC_MOVZWL: u32 = 0xB7 | P_EXT;
pub const OPC_MOVSBL: u32 = 0xBE | P_EXT;
pub const OPC_MOVSWL: u32 = 0xBF | P_EXT;
pub const OPC_MOVSLQ: u32 = 0x63 | P_REXW;

pub const OPC_JCC_long: u32 = 0x80 | P_EXT;
pub const OPC_JMP_long: u32 = 0xE9;
pub const OPC_CALL_Jz: u32 = 0xE8;

pub const OPC_BSR: u32 = 0xBD | P_EXT;
pub const OPC_LZCNT: u32 = 0xBD | P_EXT | P_SIMDF3;
pub const OPC_BSWAP: u32 = 0xC8 | P_EXT;

pub const OPC_CMOVCC: u32 = 0x40 | P_EXT;
pub const OPC_SETCC: u32 = 0x90 | P_EXT | P_REXB_RM;
pub const OPC_TESTL: u32 = 0x85;

pub const OPC_GRP3_Eb: u32 = 0xF6;
pub const OPC_GRP3_Ev: u32 = 0xF7;
pub const OPC_GRP5: u32 = 0xFF;
pub const OPC_GRPBT: u32 = 0xBA | P_EXT;

pub const OPC_IMUL_GvEv: u32 = 0xAF | P_EXT;

pub const OPC_LEA: u32 = 0x8D;
pub const OPC_XCHG_EvGv: u32 = 0x87;
pub const OPC_PUSH_r: u32 = 0x50;
pub const OPC_POP_r: u32 = 0x58;
pub const OPC_RET: u32 = 0xC3;
pub const OPC_UD2: u32 = 0x0B | P_EXT;
pub const OPC_GRP15: u32 = 0xAE | P_EXT; // ldmxcsr/stmxcsr

// SSE data movement
pub const OPC_MOVD_VdEd: u32 = 0x6E | P_EXT | P_DATA16; // xmm <- gpr
pub const OPC_MOVD_EdVd: u32 = 0x7E | P_EXT | P_DATA16; // gpr <- xmm
pub const OPC_MOVAPS_VW: u32 = 0x28 | P_EXT;
pub const OPC_MOVAPS_WV: u32 = 0x29 | P_EXT;
pub const OPC_MOVDQA_VW: u32 = 0x6F | P_EXT | P_DATA16;
pub const OPC_MOVDQA_WV: u32 = 0x7F | P_EXT | P_DATA16;
pub const OPC_MOVUPS_VW: u32 = 0x10 | P_EXT;
pub const OPC_MOVUPS_WV: u32 = 0x11 | P_EXT;
pub const OPC_MOVSS_VW: u32 = 0x10 | P_EXT | P_SIMDF3;
pub const OPC_MOVSS_WV: u32 = 0x11 | P_EXT | P_SIMDF3;
pub const OPC_MOVSD_VW: u32 = 0x10 | P_EXT | P_SIMDF2;
pub const OPC_MOVSD_WV: u32 = 0x11 | P_EXT | P_SIMDF2;

// SSE scalar arithmetic
pub const OPC_ADDSS: u32 = 0x58 | P_EXT | P_SIMDF3;
pub const OPC_ADDSD: u32 = 0x58 | P_EXT | P_SIMDF2;
pub const OPC_SUBSS: u32 = 0x5C | P_EXT | P_SIMDF3;
pub const OPC_SUBSD: u32 = 0x5C | P_EXT | P_SIMDF2;
pub const OPC_MULSS: u32 = 0x59 | P_EXT | P_SIMDF3;
pub const OPC_MULSD: u32 = 0x59 | P_EXT | P_SIMDF2;
pub const OPC_DIVSS: u32 = 0x5E | P_EXT | P_SIMDF3;
pub const OPC_DIVSD: u32 = 0x5E | P_EXT | P_SIMDF2;
pub const OPC_ANDPS: u32 = 0x54 | P_EXT;
pub const OPC_XORPS: u32 = 0x57 | P_EXT;

// SSE integer
pub const OPC_PXOR: u32 = 0xEF | P_EXT | P_DATA16;
pub const OPC_PAND: u32 = 0xDB | P_EXT | P_DATA16;
pub const OPC_POR: u32 = 0xEB | P_EXT | P_DATA16;
pub const OPC_PADDB: u32 = 0xFC | P_EXT | P_DATA16;
pub const OPC_PADDW: u32 = 0xFD | P_EXT | P_DATA16;
pub const OPC_PADDD: u32 = 0xFE | P_EXT | P_DATA16;
pub const OPC_PADDQ: u32 = 0xD4 | P_EXT | P_DATA16;
pub const OPC_PSUBB: u32 = 0xF8 | P_EXT | P_DATA16;
pub const OPC_PSUBW: u32 = 0xF9 | P_EXT | P_DATA16;
pub const OPC_PSUBD: u32 = 0xFA | P_EXT | P_DATA16;
pub const OPC_PSUBQ: u32 = 0xFB | P_EXT | P_DATA16;
pub const OPC_PABSB: u32 = 0x1C | P_EXT38 | P_DATA16;
pub const OPC_PABSW: u32 = 0x1D | P_EXT38 | P_DATA16;
pub const OPC_PABSD: u32 = 0x1E | P_EXT38 | P_DATA16;
pub const OPC_PMINUB: u32 = 0xDA | P_EXT | P_DATA16;
pub const OPC_PMAXSW: u32 = 0xEE | P_EXT | P_DATA16;
pub const OPC_PSHIFTD_GRP: u32 = 0x72 | P_EXT | P_DATA16; // /4 = psrad imm8

// -- Sub-operation enums --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Rcr = 3,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext3Op {
    Not = 2,
    Neg = 3,
    Mul = 4,
    Imul = 5,
    Div = 6,
    Idiv = 7,
}

/// x86 condition codes for Jcc/SETcc/CMOVcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Cc {
    O = 0x0, No = 0x1, B = 0x2, Ae = 0x3, E = 0x4, Ne = 0x5, Be = 0x6, A = 0x7,
    S = 0x8, Ns = 0x9, P = 0xA, Np = 0xB, L = 0xC, Ge = 0xD, Le = 0xE, G = 0xF,
}

impl Cc {
    pub fn invert(self) -> Cc {
        // Flip the low bit.
        unsafe { std::mem::transmute(self as u8 ^ 1) }
    }
}

// -- Core encoding --

#[inline]
fn rexw_flag(rexw: bool) -> u32 {
    if rexw {
        P_REXW
    } else {
        0
    }
}

/// Emit prefixes + escape + opcode byte. `r` is the reg field, `rm`
/// the r/m (or opcode-embedded) register, `index` the SIB index or 0.
fn emit_opc_idx(code: &mut BlockOfCode, opc: u32, r: u8, rm: u8, index: u8) {
    let mut rex: u8 = 0;
    if opc & P_REXW != 0 {
        rex |= 0x08;
    }
    if r >= 8 {
        rex |= 0x04;
    }
    if index >= 8 {
        rex |= 0x02;
    }
    if rm >= 8 {
        rex |= 0x01;
    }
    // Byte-register access to SPL/BPL/SIL/DIL forces an empty REX.
    if rex == 0
        && ((opc & P_REXB_R != 0 && (4u8..8).contains(&r))
            || (opc & P_REXB_RM != 0 && (4u8..8).contains(&rm)))
    {
        rex = 0x40;
    }

    if opc & P_DATA16 != 0 {
        code.emit_u8(0x66);
    }
    if opc & P_SIMDF3 != 0 {
        code.emit_u8(0xF3);
    } else if opc & P_SIMDF2 != 0 {
        code.emit_u8(0xF2);
    }
    if rex != 0 {
        code.emit_u8(0x40 | rex);
    }
    if opc & (P_EXT | P_EXT38) != 0 {
        code.emit_u8(0x0F);
        if opc & P_EXT38 != 0 {
            code.emit_u8(0x38);
        }
    }
    code.emit_u8(opc as u8);
}

pub fn emit_opc(code: &mut BlockOfCode, opc: u32, r: u8, rm: u8) {
    emit_opc_idx(code, opc, r, rm, 0);
}

/// ModRM register-register form.
fn emit_modrm_raw(code: &mut BlockOfCode, opc: u32, r: u8, rm: u8) {
    emit_opc(code, opc, r, rm);
    code.emit_u8(0xC0 | ((r & 7) << 3) | (rm & 7));
}

/// ModRM `[base + disp]` form. RBP/R13 always need a displacement;
/// RSP/R12 always need a SIB byte.
fn emit_modrm_mem_raw(code: &mut BlockOfCode, opc: u32, r: u8, base: u8, disp: i32) {
    emit_opc(code, opc, r, base);
    let r3 = r & 7;
    let b3 = base & 7;
    if disp == 0 && b3 != 5 {
        if b3 == 4 {
            code.emit_u8((r3 << 3) | 0x04);
            code.emit_u8(0x24);
        } else {
            code.emit_u8((r3 << 3) | b3);
        }
    } else if (-128..=127).contains(&disp) {
        if b3 == 4 {
            code.emit_u8(0x44 | (r3 << 3));
            code.emit_u8(0x24);
        } else {
            code.emit_u8(0x40 | (r3 << 3) | b3);
        }
        code.emit_u8(disp as u8);
    } else {
        if b3 == 4 {
            code.emit_u8(0x84 | (r3 << 3));
            code.emit_u8(0x24);
        } else {
            code.emit_u8(0x80 | (r3 << 3) | b3);
        }
        code.emit_u32(disp as u32);
    }
}

/// ModRM + SIB `[base + index + disp]` form (scale 1).
fn emit_modrm_sib_raw(code: &mut BlockOfCode, opc: u32, r: u8, base: u8, index: u8, disp: i32) {
    assert!(index & 7 != 4, "RSP cannot be an index register");
    emit_opc_idx(code, opc, r, base, index);
    let r3 = r & 7;
    let sib = ((index & 7) << 3) | (base & 7);
    if disp == 0 && base & 7 != 5 {
        code.emit_u8((r3 << 3) | 0x04);
        code.emit_u8(sib);
    } else if (-128..=127).contains(&disp) {
        code.emit_u8(0x44 | (r3 << 3));
        code.emit_u8(sib);
        code.emit_u8(disp as u8);
    } else {
        code.emit_u8(0x84 | (r3 << 3));
        code.emit_u8(sib);
        code.emit_u32(disp as u32);
    }
}

/// ModRM RIP-relative form; `target` is an offset into the code
/// buffer. No immediate may follow.
fn emit_modrm_rip_raw(code: &mut BlockOfCode, opc: u32, r: u8, target: usize) {
    emit_opc(code, opc, r, 0);
    code.emit_u8(((r & 7) << 3) | 0x05);
    let after = code.offset() + 4;
    let disp = target as i64 - after as i64;
    assert!(
        i32::try_from(disp).is_ok(),
        "RIP-relative displacement out of range"
    );
    code.emit_u32(disp as u32);
}

// -- GPR data movement --

pub fn emit_mov_rr(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVL_EvGv | rexw_flag(rexw), src as u8, dst as u8);
}

pub fn emit_mov_ri(code: &mut BlockOfCode, rexw: bool, dst: Gpr, val: u64) {
    if val == 0 {
        emit_modrm_raw(code, 0x31, dst as u8, dst as u8);
    } else if !rexw || val <= u32::MAX as u64 {
        emit_opc(code, OPC_MOVL_Iv + u32::from(dst.low3()), 0, dst as u8);
        code.emit_u32(val as u32);
    } else if val as i64 >= i32::MIN as i64 && val as i64 <= i32::MAX as i64 {
        emit_modrm_raw(code, OPC_MOVL_EvIz | P_REXW, 0, dst as u8);
        code.emit_u32(val as u32);
    } else {
        emit_opc(
            code,
            (OPC_MOVL_Iv + u32::from(dst.low3())) | P_REXW,
            0,
            dst as u8,
        );
        code.emit_u64(val);
    }
}

/// `mov rcx, imm64` in the fixed 10-byte encoding, for patchable
/// sites.
pub fn emit_mov_rcx_imm64_fixed(code: &mut BlockOfCode, val: u64) {
    code.emit_u8(0x48);
    code.emit_u8(0xB9);
    code.emit_u64(val);
}

pub fn emit_movzx8(code: &mut BlockOfCode, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVZBL | P_REXB_RM, dst as u8, src as u8);
}

pub fn emit_movzx16(code: &mut BlockOfCode, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVZWL, dst as u8, src as u8);
}

pub fn emit_movsx8(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(
        code,
        OPC_MOVSBL | P_REXB_RM | rexw_flag(rexw),
        dst as u8,
        src as u8,
    );
}

pub fn emit_movsx16(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVSWL | rexw_flag(rexw), dst as u8, src as u8);
}

pub fn emit_movsxd(code: &mut BlockOfCode, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVSLQ, dst as u8, src as u8);
}

// -- GPR memory access --

pub fn emit_load(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVL_GvEv | rexw_flag(rexw), dst as u8, base as u8, disp);
}

pub fn emit_store(code: &mut BlockOfCode, rexw: bool, src: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVL_EvGv | rexw_flag(rexw), src as u8, base as u8, disp);
}

pub fn emit_load_zx8(code: &mut BlockOfCode, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVZBL, dst as u8, base as u8, disp);
}

pub fn emit_load_zx16(code: &mut BlockOfCode, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVZWL, dst as u8, base as u8, disp);
}

pub fn emit_load_sx8(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(
        code,
        OPC_MOVSBL | rexw_flag(rexw),
        dst as u8,
        base as u8,
        disp,
    );
}

pub fn emit_load_sx16(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(
        code,
        OPC_MOVSWL | rexw_flag(rexw),
        dst as u8,
        base as u8,
        disp,
    );
}

pub fn emit_store8(code: &mut BlockOfCode, src: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVB_EvGv | P_REXB_R, src as u8, base as u8, disp);
}

pub fn emit_store16(code: &mut BlockOfCode, src: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_MOVL_EvGv | P_DATA16, src as u8, base as u8, disp);
}

pub fn emit_store_imm32(code: &mut BlockOfCode, rexw: bool, base: Gpr, disp: i32, imm: u32) {
    emit_modrm_mem_raw(code, OPC_MOVL_EvIz | rexw_flag(rexw), 0, base as u8, disp);
    code.emit_u32(imm);
}

pub fn emit_store_imm8(code: &mut BlockOfCode, base: Gpr, disp: i32, imm: u8) {
    emit_modrm_mem_raw(code, 0xC6, 0, base as u8, disp);
    code.emit_u8(imm);
}

pub fn emit_load_sib(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(
        code,
        OPC_MOVL_GvEv | rexw_flag(rexw),
        dst as u8,
        base as u8,
        index as u8,
        disp,
    );
}

pub fn emit_load_zx8_sib(code: &mut BlockOfCode, dst: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(code, OPC_MOVZBL, dst as u8, base as u8, index as u8, disp);
}

pub fn emit_load_zx16_sib(code: &mut BlockOfCode, dst: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(code, OPC_MOVZWL, dst as u8, base as u8, index as u8, disp);
}

pub fn emit_store_sib(code: &mut BlockOfCode, rexw: bool, src: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(
        code,
        OPC_MOVL_EvGv | rexw_flag(rexw),
        src as u8,
        base as u8,
        index as u8,
        disp,
    );
}

pub fn emit_store8_sib(code: &mut BlockOfCode, src: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(
        code,
        OPC_MOVB_EvGv | P_REXB_R,
        src as u8,
        base as u8,
        index as u8,
        disp,
    );
}

pub fn emit_store16_sib(code: &mut BlockOfCode, src: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(
        code,
        OPC_MOVL_EvGv | P_DATA16,
        src as u8,
        base as u8,
        index as u8,
        disp,
    );
}

pub fn emit_lea(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_LEA | rexw_flag(rexw), dst as u8, base as u8, disp);
}

pub fn emit_lea_sib(code: &mut BlockOfCode, rexw: bool, dst: Gpr, base: Gpr, index: Gpr, disp: i32) {
    emit_modrm_sib_raw(
        code,
        OPC_LEA | rexw_flag(rexw),
        dst as u8,
        base as u8,
        index as u8,
        disp,
    );
}

// -- GPR arithmetic / logic --

pub fn emit_arith_rr(code: &mut BlockOfCode, op: ArithOp, rexw: bool, dst: Gpr, src: Gpr) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_raw(code, opc, dst as u8, src as u8);
}

pub fn emit_arith_ri(code: &mut BlockOfCode, op: ArithOp, rexw: bool, dst: Gpr, imm: i32) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_raw(code, OPC_ARITH_EvIb | w, op as u8, dst as u8);
        code.emit_u8(imm as u8);
    } else {
        emit_modrm_raw(code, OPC_ARITH_EvIz | w, op as u8, dst as u8);
        code.emit_u32(imm as u32);
    }
}

/// Arithmetic `reg <- reg op [base + disp]`.
pub fn emit_arith_rm(
    code: &mut BlockOfCode,
    op: ArithOp,
    rexw: bool,
    dst: Gpr,
    base: Gpr,
    disp: i32,
) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_mem_raw(code, opc, dst as u8, base as u8, disp);
}

/// Arithmetic `[base + disp] <- [base + disp] op reg`.
pub fn emit_arith_mr(
    code: &mut BlockOfCode,
    op: ArithOp,
    rexw: bool,
    base: Gpr,
    disp: i32,
    src: Gpr,
) {
    let opc = (OPC_ARITH_EvGv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_mem_raw(code, opc, src as u8, base as u8, disp);
}

/// `cmp reg, [base + index + disp]`.
pub fn emit_cmp_rm_sib(
    code: &mut BlockOfCode,
    rexw: bool,
    reg: Gpr,
    base: Gpr,
    index: Gpr,
    disp: i32,
) {
    let opc = (OPC_ARITH_GvEv + ((ArithOp::Cmp as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_sib_raw(code, opc, reg as u8, base as u8, index as u8, disp);
}

/// Arithmetic on `[base + disp]` with an immediate.
pub fn emit_arith_mi(
    code: &mut BlockOfCode,
    op: ArithOp,
    rexw: bool,
    base: Gpr,
    disp: i32,
    imm: i32,
) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_mem_raw(code, OPC_ARITH_EvIb | w, op as u8, base as u8, disp);
        code.emit_u8(imm as u8);
    } else {
        emit_modrm_mem_raw(code, OPC_ARITH_EvIz | w, op as u8, base as u8, disp);
        code.emit_u32(imm as u32);
    }
}

pub fn emit_neg(code: &mut BlockOfCode, rexw: bool, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Neg as u8, reg as u8);
}

pub fn emit_not(code: &mut BlockOfCode, rexw: bool, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Not as u8, reg as u8);
}

pub fn emit_shift_ri(code: &mut BlockOfCode, op: ShiftOp, rexw: bool, reg: Gpr, imm: u8) {
    let w = rexw_flag(rexw);
    if imm == 1 {
        emit_modrm_raw(code, OPC_SHIFT_1 | w, op as u8, reg as u8);
    } else {
        emit_modrm_raw(code, OPC_SHIFT_Ib | w, op as u8, reg as u8);
        code.emit_u8(imm);
    }
}

pub fn emit_shift_cl(code: &mut BlockOfCode, op: ShiftOp, rexw: bool, reg: Gpr) {
    emit_modrm_raw(code, OPC_SHIFT_cl | rexw_flag(rexw), op as u8, reg as u8);
}

pub fn emit_imul_rr(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_IMUL_GvEv | rexw_flag(rexw), dst as u8, src as u8);
}

pub fn emit_div(code: &mut BlockOfCode, rexw: bool, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Div as u8, reg as u8);
}

pub fn emit_idiv(code: &mut BlockOfCode, rexw: bool, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Idiv as u8, reg as u8);
}

pub fn emit_cdq(code: &mut BlockOfCode) {
    code.emit_u8(0x99);
}

pub fn emit_test_rr(code: &mut BlockOfCode, rexw: bool, a: Gpr, b: Gpr) {
    emit_modrm_raw(code, OPC_TESTL | rexw_flag(rexw), b as u8, a as u8);
}

pub fn emit_test_ri(code: &mut BlockOfCode, rexw: bool, reg: Gpr, imm: u32) {
    emit_modrm_raw(code, OPC_GRP3_Ev | rexw_flag(rexw), 0, reg as u8);
    code.emit_u32(imm);
}

pub fn emit_test_mi8(code: &mut BlockOfCode, base: Gpr, disp: i32, imm: u8) {
    emit_modrm_mem_raw(code, OPC_GRP3_Eb, 0, base as u8, disp);
    code.emit_u8(imm);
}

pub fn emit_test_mi32(code: &mut BlockOfCode, base: Gpr, disp: i32, imm: u32) {
    emit_modrm_mem_raw(code, OPC_GRP3_Ev, 0, base as u8, disp);
    code.emit_u32(imm);
}

pub fn emit_bt_ri(code: &mut BlockOfCode, rexw: bool, reg: Gpr, bit: u8) {
    emit_modrm_raw(code, OPC_GRPBT | rexw_flag(rexw), 4, reg as u8);
    code.emit_u8(bit);
}

pub fn emit_bt_mi(code: &mut BlockOfCode, base: Gpr, disp: i32, bit: u8) {
    emit_modrm_mem_raw(code, OPC_GRPBT, 4, base as u8, disp);
    code.emit_u8(bit);
}

pub fn emit_bswap(code: &mut BlockOfCode, rexw: bool, reg: Gpr) {
    emit_opc(
        code,
        (OPC_BSWAP + u32::from(reg.low3())) | rexw_flag(rexw),
        0,
        reg as u8,
    );
}

pub fn emit_bsr(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_BSR | rexw_flag(rexw), dst as u8, src as u8);
}

pub fn emit_lzcnt(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(code, OPC_LZCNT | rexw_flag(rexw), dst as u8, src as u8);
}

pub fn emit_xchg(code: &mut BlockOfCode, rexw: bool, a: Gpr, b: Gpr) {
    emit_modrm_raw(code, OPC_XCHG_EvGv | rexw_flag(rexw), a as u8, b as u8);
}

pub fn emit_stc(code: &mut BlockOfCode) {
    code.emit_u8(0xF9);
}

pub fn emit_cmc(code: &mut BlockOfCode) {
    code.emit_u8(0xF5);
}

pub fn emit_clc(code: &mut BlockOfCode) {
    code.emit_u8(0xF8);
}

// -- Conditionals --

pub fn emit_setcc(code: &mut BlockOfCode, cc: Cc, dst: Gpr) {
    emit_modrm_raw(code, OPC_SETCC + (cc as u32), 0, dst as u8);
}

pub fn emit_cmovcc(code: &mut BlockOfCode, cc: Cc, rexw: bool, dst: Gpr, src: Gpr) {
    emit_modrm_raw(
        code,
        (OPC_CMOVCC + (cc as u32)) | rexw_flag(rexw),
        dst as u8,
        src as u8,
    );
}

// -- Branches --

/// A pending rel32 to resolve with [`resolve_forward`].
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct FwdJump {
    pub patch_offset: usize,
}

pub fn emit_jcc_forward(code: &mut BlockOfCode, cc: Cc) -> FwdJump {
    emit_opc(code, OPC_JCC_long + (cc as u32), 0, 0);
    let patch_offset = code.offset();
    code.emit_u32(0);
    FwdJump { patch_offset }
}

pub fn emit_jmp_forward(code: &mut BlockOfCode) -> FwdJump {
    code.emit_u8(OPC_JMP_long as u8);
    let patch_offset = code.offset();
    code.emit_u32(0);
    FwdJump { patch_offset }
}

/// Point a pending rel32 at the current cursor.
pub fn resolve_forward(code: &mut BlockOfCode, jump: FwdJump) {
    let target = code.offset();
    let disp = target as i64 - (jump.patch_offset as i64 + 4);
    code.patch_u32(jump.patch_offset, disp as u32);
}

pub fn emit_jcc_to(code: &mut BlockOfCode, cc: Cc, target: usize) {
    emit_opc(code, OPC_JCC_long + (cc as u32), 0, 0);
    let after = code.offset() + 4;
    code.emit_u32((target as i64 - after as i64) as u32);
}

pub fn emit_jmp_to(code: &mut BlockOfCode, target: usize) {
    code.emit_u8(OPC_JMP_long as u8);
    let after = code.offset() + 4;
    code.emit_u32((target as i64 - after as i64) as u32);
}

pub fn emit_jmp_reg(code: &mut BlockOfCode, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP5, 4, reg as u8);
}

pub fn emit_call_reg(code: &mut BlockOfCode, reg: Gpr) {
    emit_modrm_raw(code, OPC_GRP5, 2, reg as u8);
}

pub fn emit_call_to(code: &mut BlockOfCode, target: usize) {
    code.emit_u8(OPC_CALL_Jz as u8);
    let after = code.offset() + 4;
    code.emit_u32((target as i64 - after as i64) as u32);
}

pub fn emit_push(code: &mut BlockOfCode, reg: Gpr) {
    emit_opc(code, OPC_PUSH_r + u32::from(reg.low3()), 0, reg as u8);
}

pub fn emit_pop(code: &mut BlockOfCode, reg: Gpr) {
    emit_opc(code, OPC_POP_r + u32::from(reg.low3()), 0, reg as u8);
}

pub fn emit_ret(code: &mut BlockOfCode) {
    code.emit_u8(OPC_RET as u8);
}

pub fn emit_ud2(code: &mut BlockOfCode) {
    emit_opc(code, OPC_UD2, 0, 0);
}

pub fn emit_int3(code: &mut BlockOfCode) {
    code.emit_u8(0xCC);
}

/// Recommended multi-byte NOP padding.
pub fn emit_nops(code: &mut BlockOfCode, mut n: usize) {
    while n > 0 {
        match n {
            1 => {
                code.emit_u8(0x90);
                n -= 1;
            }
            2 => {
                code.emit_u8(0x66);
                code.emit_u8(0x90);
                n -= 2;
            }
            3 => {
                code.emit_bytes(&[0x0F, 0x1F, 0x00]);
                n -= 3;
            }
            4 => {
                code.emit_bytes(&[0x0F, 0x1F, 0x40, 0x00]);
                n -= 4;
            }
            5 => {
                code.emit_bytes(&[0x0F, 0x1F, 0x44, 0x00, 0x00]);
                n -= 5;
            }
            6 => {
                code.emit_bytes(&[0x66, 0x0F, 0x1F, 0x44, 0x00, 0x00]);
                n -= 6;
            }
            7 => {
                code.emit_bytes(&[0x0F, 0x1F, 0x80, 0x00, 0x00, 0x00, 0x00]);
                n -= 7;
            }
            _ => {
                code.emit_bytes(&[0x0F, 0x1F, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00]);
                n -= 8;
            }
        }
    }
}

// -- MXCSR --

pub fn emit_ldmxcsr(code: &mut BlockOfCode, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_GRP15, 2, base as u8, disp);
}

pub fn emit_stmxcsr(code: &mut BlockOfCode, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, OPC_GRP15, 3, base as u8, disp);
}

// -- SSE --

pub fn emit_sse_rr(code: &mut BlockOfCode, opc: u32, dst: Xmm, src: Xmm) {
    emit_modrm_raw(code, opc, dst as u8, src as u8);
}

pub fn emit_sse_rm(code: &mut BlockOfCode, opc: u32, dst: Xmm, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, opc, dst as u8, base as u8, disp);
}

/// Store forms (`W <- V`): the xmm is in the reg field.
pub fn emit_sse_mr(code: &mut BlockOfCode, opc: u32, src: Xmm, base: Gpr, disp: i32) {
    emit_modrm_mem_raw(code, opc, src as u8, base as u8, disp);
}

pub fn emit_sse_rip(code: &mut BlockOfCode, opc: u32, dst: Xmm, target: usize) {
    emit_modrm_rip_raw(code, opc, dst as u8, target);
}

/// `movd`/`movq` xmm <- gpr.
pub fn emit_movd_to_xmm(code: &mut BlockOfCode, rexw: bool, dst: Xmm, src: Gpr) {
    emit_modrm_raw(code, OPC_MOVD_VdEd | rexw_flag(rexw), dst as u8, src as u8);
}

/// `movd`/`movq` gpr <- xmm.
pub fn emit_movd_from_xmm(code: &mut BlockOfCode, rexw: bool, dst: Gpr, src: Xmm) {
    emit_modrm_raw(code, OPC_MOVD_EdVd | rexw_flag(rexw), src as u8, dst as u8);
}

pub fn emit_movaps_rr(code: &mut BlockOfCode, dst: Xmm, src: Xmm) {
    emit_modrm_raw(code, OPC_MOVAPS_VW, dst as u8, src as u8);
}

pub fn emit_movaps_load(code: &mut BlockOfCode, dst: Xmm, base: Gpr, disp: i32) {
    emit_sse_rm(code, OPC_MOVAPS_VW, dst, base, disp);
}

pub fn emit_movaps_store(code: &mut BlockOfCode, src: Xmm, base: Gpr, disp: i32) {
    emit_sse_mr(code, OPC_MOVAPS_WV, src, base, disp);
}

pub fn emit_movups_load(code: &mut BlockOfCode, dst: Xmm, base: Gpr, disp: i32) {
    emit_sse_rm(code, OPC_MOVUPS_VW, dst, base, disp);
}

pub fn emit_movups_store(code: &mut BlockOfCode, src: Xmm, base: Gpr, disp: i32) {
    emit_sse_mr(code, OPC_MOVUPS_WV, src, base, disp);
}

pub fn emit_movss_load(code: &mut BlockOfCode, dst: Xmm, base: Gpr, disp: i32) {
    emit_sse_rm(code, OPC_MOVSS_VW, dst, base, disp);
}

pub fn emit_movss_store(code: &mut BlockOfCode, src: Xmm, base: Gpr, disp: i32) {
    emit_sse_mr(code, OPC_MOVSS_WV, src, base, disp);
}

pub fn emit_movsd_load(code: &mut BlockOfCode, dst: Xmm, base: Gpr, disp: i32) {
    emit_sse_rm(code, OPC_MOVSD_VW, dst, base, disp);
}

pub fn emit_movsd_store(code: &mut BlockOfCode, src: Xmm, base: Gpr, disp: i32) {
    emit_sse_mr(code, OPC_MOVSD_WV, src, base, disp);
}

/// `psrad xmm, imm8` (the /4 form of group 0x72).
pub fn emit_psrad_ri(code: &mut BlockOfCode, reg: Xmm, imm: u8) {
    emit_modrm_raw(code, OPC_PSHIFTD_GRP, 4, reg as u8);
    code.emit_u8(imm);
}
