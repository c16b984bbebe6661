//! Thumb-16 decode table.

use once_cell::sync::Lazy;

use dbt_ir::A32Reg;

use crate::decoder::{bit, bits, DecodeTable, Matcher};

use super::ThumbTranslatorVisitor;

fn reg(w: u32, lo: u32) -> A32Reg {
    A32Reg::from_bits(bits(w, lo, 3))
}

/// Hi-register operand: the extra bit concatenates above the 3-bit
/// field.
fn hreg(w: u32, lo: u32, hi_bit: u32) -> A32Reg {
    A32Reg::from_bits(bits(w, lo, 3) | (u32::from(bit(w, hi_bit)) << 3))
}

type V = ThumbTranslatorVisitor;

pub fn thumb16_table() -> &'static DecodeTable<V> {
    static TABLE: Lazy<DecodeTable<ThumbTranslatorVisitor>> = Lazy::new(build);
    &TABLE
}

#[rustfmt::skip]
fn build() -> DecodeTable<V> {
    let mut m: Vec<Matcher<V>> = Vec::new();

    // -- Shift (immediate), add, subtract, move, compare --
    m.push(Matcher::new("LSL (imm)", "00000vvvvvmmmddd",
        |v, w| v.thumb16_lsl_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LSR (imm)", "00001vvvvvmmmddd",
        |v, w| v.thumb16_lsr_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("ASR (imm)", "00010vvvvvmmmddd",
        |v, w| v.thumb16_asr_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("ADD (reg)", "0001100mmmnnnddd",
        |v, w| v.thumb16_add_reg_t1(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("SUB (reg)", "0001101mmmnnnddd",
        |v, w| v.thumb16_sub_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("ADD (imm3)", "0001110vvvnnnddd",
        |v, w| v.thumb16_add_imm3(bits(w, 6, 3), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("SUB (imm3)", "0001111vvvnnnddd",
        |v, w| v.thumb16_sub_imm3(bits(w, 6, 3), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("MOV (imm)", "00100dddvvvvvvvv",
        |v, w| v.thumb16_mov_imm(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("CMP (imm)", "00101nnnvvvvvvvv",
        |v, w| v.thumb16_cmp_imm(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("ADD (imm8)", "00110dddvvvvvvvv",
        |v, w| v.thumb16_add_imm8(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("SUB (imm8)", "00111dddvvvvvvvv",
        |v, w| v.thumb16_sub_imm8(reg(w, 8), bits(w, 0, 8))));

    // -- Data processing (register) --
    m.push(Matcher::new("DP (reg)", "010000oooommmddd",
        |v, w| v.thumb16_data_processing(bits(w, 6, 4), reg(w, 3), reg(w, 0))));

    // -- Hi-register operations / branch exchange --
    m.push(Matcher::new("ADD (hi)", "01000100dmmmmddd",
        |v, w| v.thumb16_add_hi(hreg(w, 0, 7), hreg(w, 3, 6))));
    m.push(Matcher::new("CMP (hi)", "01000101nmmmmnnn",
        |v, w| v.thumb16_cmp_hi(hreg(w, 0, 7), hreg(w, 3, 6))));
    m.push(Matcher::new("MOV (hi)", "01000110dmmmmddd",
        |v, w| v.thumb16_mov_hi(hreg(w, 0, 7), hreg(w, 3, 6))));
    m.push(Matcher::new("BX", "010001110mmmm000",
        |v, w| v.thumb16_bx(hreg(w, 3, 6))));
    m.push(Matcher::new("BLX (reg)", "010001111mmmm000",
        |v, w| v.thumb16_blx_reg(hreg(w, 3, 6))));

    // -- Load/store --
    m.push(Matcher::new("LDR (literal)", "01001tttvvvvvvvv",
        |v, w| v.thumb16_ldr_literal(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("STR (reg)", "0101000mmmnnnttt",
        |v, w| v.thumb16_str_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STRH (reg)", "0101001mmmnnnttt",
        |v, w| v.thumb16_strh_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STRB (reg)", "0101010mmmnnnttt",
        |v, w| v.thumb16_strb_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRSB (reg)", "0101011mmmnnnttt",
        |v, w| v.thumb16_ldrsb_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDR (reg)", "0101100mmmnnnttt",
        |v, w| v.thumb16_ldr_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRH (reg)", "0101101mmmnnnttt",
        |v, w| v.thumb16_ldrh_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRB (reg)", "0101110mmmnnnttt",
        |v, w| v.thumb16_ldrb_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRSH (reg)", "0101111mmmnnnttt",
        |v, w| v.thumb16_ldrsh_reg(reg(w, 6), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STR (imm)", "01100vvvvvnnnttt",
        |v, w| v.thumb16_str_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDR (imm)", "01101vvvvvnnnttt",
        |v, w| v.thumb16_ldr_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STRB (imm)", "01110vvvvvnnnttt",
        |v, w| v.thumb16_strb_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRB (imm)", "01111vvvvvnnnttt",
        |v, w| v.thumb16_ldrb_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STRH (imm)", "10000vvvvvnnnttt",
        |v, w| v.thumb16_strh_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("LDRH (imm)", "10001vvvvvnnnttt",
        |v, w| v.thumb16_ldrh_imm(bits(w, 6, 5), reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("STR (sp)", "10010tttvvvvvvvv",
        |v, w| v.thumb16_str_sp(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("LDR (sp)", "10011tttvvvvvvvv",
        |v, w| v.thumb16_ldr_sp(reg(w, 8), bits(w, 0, 8))));

    // -- Address generation / SP adjustment --
    m.push(Matcher::new("ADR", "10100dddvvvvvvvv",
        |v, w| v.thumb16_adr(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("ADD (sp+imm8)", "10101dddvvvvvvvv",
        |v, w| v.thumb16_add_sp_imm8(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("ADD (sp+imm7)", "101100000vvvvvvv",
        |v, w| v.thumb16_add_sp_imm7(bits(w, 0, 7))));
    m.push(Matcher::new("SUB (sp-imm7)", "101100001vvvvvvv",
        |v, w| v.thumb16_sub_sp_imm7(bits(w, 0, 7))));

    // -- Extension / byte reversal --
    m.push(Matcher::new("SXTH", "1011001000mmmddd",
        |v, w| v.thumb16_sxth(reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("SXTB", "1011001001mmmddd",
        |v, w| v.thumb16_sxtb(reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("UXTH", "1011001010mmmddd",
        |v, w| v.thumb16_uxth(reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("UXTB", "1011001011mmmddd",
        |v, w| v.thumb16_uxtb(reg(w, 3), reg(w, 0))));
    m.push(Matcher::new("REV", "1011101000mmmddd",
        |v, w| v.thumb16_rev(reg(w, 3), reg(w, 0))));

    // -- Push/pop, load/store multiple --
    m.push(Matcher::new("PUSH", "1011010rxxxxxxxx",
        |v, w| v.thumb16_push(bit(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("POP", "1011110rxxxxxxxx",
        |v, w| v.thumb16_pop(bit(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("STM", "11000nnnxxxxxxxx",
        |v, w| v.thumb16_stm(reg(w, 8), bits(w, 0, 8))));
    m.push(Matcher::new("LDM", "11001nnnxxxxxxxx",
        |v, w| v.thumb16_ldm(reg(w, 8), bits(w, 0, 8))));

    // -- Branches / exceptions --
    m.push(Matcher::new("UDF", "11011110vvvvvvvv", |v, _| v.thumb16_udf()));
    m.push(Matcher::new("SVC", "11011111vvvvvvvv",
        |v, w| v.thumb16_svc(bits(w, 0, 8))));
    m.push(Matcher::new("B (cond)", "1101ccccvvvvvvvv",
        |v, w| v.thumb16_b_cond(bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("B", "11100vvvvvvvvvvv",
        |v, w| v.thumb16_b(bits(w, 0, 11))));
    m.push(Matcher::new("BKPT", "10111110vvvvvvvv",
        |v, w| v.thumb16_bkpt(bits(w, 0, 8))));
    m.push(Matcher::new("NOP", "1011111100000000", |v, _| v.thumb16_nop()));

    DecodeTable::new(m)
}
