//! A32 main decode table.
//!
//! Each entry pairs a textual bit-pattern with a handler that performs
//! the field extractions inline and calls the visitor method. Table
//! construction sorts by specificity, so e.g. MUL (fixed `1001` in bits
//! 7..4) wins over the data-processing register patterns it overlaps.

use once_cell::sync::Lazy;

use dbt_ir::{A32Reg, Cond};

use crate::decoder::{bit, bits, DecodeTable, Matcher};

use super::{ArmTranslatorVisitor, ShiftType};

fn cond(w: u32) -> Cond {
    Cond::from_bits(bits(w, 28, 4))
}

fn reg(w: u32, lo: u32) -> A32Reg {
    A32Reg::from_bits(bits(w, lo, 4))
}

fn stype(w: u32) -> ShiftType {
    ShiftType::from_bits(bits(w, 5, 2))
}

type V = ArmTranslatorVisitor;

pub fn arm_table() -> &'static DecodeTable<V> {
    static TABLE: Lazy<DecodeTable<ArmTranslatorVisitor>> = Lazy::new(build);
    &TABLE
}

#[rustfmt::skip]
fn build() -> DecodeTable<V> {
    let mut m: Vec<Matcher<V>> = Vec::new();

    // -- Data processing (register, shift by immediate) --
    m.push(Matcher::new("AND (reg)", "cccc0000000Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_and_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("EOR (reg)", "cccc0000001Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_eor_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("SUB (reg)", "cccc0000010Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_sub_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("RSB (reg)", "cccc0000011Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_rsb_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("ADD (reg)", "cccc0000100Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_add_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("ADC (reg)", "cccc0000101Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_adc_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("SBC (reg)", "cccc0000110Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_sbc_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("RSC (reg)", "cccc0000111Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_rsc_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("TST (reg)", "cccc00010001nnnn0000vvvvvrr0mmmm",
        |v, w| v.arm_tst_reg(cond(w), reg(w, 16), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("TEQ (reg)", "cccc00010011nnnn0000vvvvvrr0mmmm",
        |v, w| v.arm_teq_reg(cond(w), reg(w, 16), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("CMP (reg)", "cccc00010101nnnn0000vvvvvrr0mmmm",
        |v, w| v.arm_cmp_reg(cond(w), reg(w, 16), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("CMN (reg)", "cccc00010111nnnn0000vvvvvrr0mmmm",
        |v, w| v.arm_cmn_reg(cond(w), reg(w, 16), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("ORR (reg)", "cccc0001100Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_orr_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("MOV (reg)", "cccc0001101S0000ddddvvvvvrr0mmmm",
        |v, w| v.arm_mov_reg(cond(w), bit(w, 20), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("BIC (reg)", "cccc0001110Snnnnddddvvvvvrr0mmmm",
        |v, w| v.arm_bic_reg(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("MVN (reg)", "cccc0001111S0000ddddvvvvvrr0mmmm",
        |v, w| v.arm_mvn_reg(cond(w), bit(w, 20), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));

    // -- Data processing (immediate) --
    m.push(Matcher::new("AND (imm)", "cccc0010000Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_and_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("EOR (imm)", "cccc0010001Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_eor_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("SUB (imm)", "cccc0010010Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_sub_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("RSB (imm)", "cccc0010011Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_rsb_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("ADD (imm)", "cccc0010100Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_add_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("ADC (imm)", "cccc0010101Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_adc_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("SBC (imm)", "cccc0010110Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_sbc_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("RSC (imm)", "cccc0010111Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_rsc_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("TST (imm)", "cccc00110001nnnn0000rrrrvvvvvvvv",
        |v, w| v.arm_tst_imm(cond(w), reg(w, 16), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("TEQ (imm)", "cccc00110011nnnn0000rrrrvvvvvvvv",
        |v, w| v.arm_teq_imm(cond(w), reg(w, 16), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("CMP (imm)", "cccc00110101nnnn0000rrrrvvvvvvvv",
        |v, w| v.arm_cmp_imm(cond(w), reg(w, 16), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("CMN (imm)", "cccc00110111nnnn0000rrrrvvvvvvvv",
        |v, w| v.arm_cmn_imm(cond(w), reg(w, 16), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("ORR (imm)", "cccc0011100Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_orr_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("MOV (imm)", "cccc0011101S0000ddddrrrrvvvvvvvv",
        |v, w| v.arm_mov_imm(cond(w), bit(w, 20), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("BIC (imm)", "cccc0011110Snnnnddddrrrrvvvvvvvv",
        |v, w| v.arm_bic_imm(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("MVN (imm)", "cccc0011111S0000ddddrrrrvvvvvvvv",
        |v, w| v.arm_mvn_imm(cond(w), bit(w, 20), reg(w, 12), bits(w, 8, 4), bits(w, 0, 8))));

    // -- Multiply / divide --
    m.push(Matcher::new("MUL", "cccc0000000Sdddd0000ssss1001mmmm",
        |v, w| v.arm_mul(cond(w), bit(w, 20), reg(w, 16), reg(w, 8), reg(w, 0))));
    m.push(Matcher::new("MLA", "cccc0000001Sddddaaaassss1001mmmm",
        |v, w| v.arm_mla(cond(w), bit(w, 20), reg(w, 16), reg(w, 12), reg(w, 8), reg(w, 0))));
    m.push(Matcher::new("SDIV", "cccc01110001dddd1111mmmm0001nnnn",
        |v, w| v.arm_sdiv(cond(w), reg(w, 16), reg(w, 8), reg(w, 0))));
    m.push(Matcher::new("UDIV", "cccc01110011dddd1111mmmm0001nnnn",
        |v, w| v.arm_udiv(cond(w), reg(w, 16), reg(w, 8), reg(w, 0))));

    // -- CLZ / extension / byte reversal --
    m.push(Matcher::new("CLZ", "cccc000101101111dddd11110001mmmm",
        |v, w| v.arm_clz(cond(w), reg(w, 12), reg(w, 0))));
    m.push(Matcher::new("SXTB", "cccc011010101111ddddrr000111mmmm",
        |v, w| v.arm_sxtb(cond(w), reg(w, 12), bits(w, 10, 2), reg(w, 0))));
    m.push(Matcher::new("SXTH", "cccc011010111111ddddrr000111mmmm",
        |v, w| v.arm_sxth(cond(w), reg(w, 12), bits(w, 10, 2), reg(w, 0))));
    m.push(Matcher::new("UXTB", "cccc011011101111ddddrr000111mmmm",
        |v, w| v.arm_uxtb(cond(w), reg(w, 12), bits(w, 10, 2), reg(w, 0))));
    m.push(Matcher::new("UXTH", "cccc011011111111ddddrr000111mmmm",
        |v, w| v.arm_uxth(cond(w), reg(w, 12), bits(w, 10, 2), reg(w, 0))));
    m.push(Matcher::new("REV", "cccc011010111111dddd11110011mmmm",
        |v, w| v.arm_rev(cond(w), reg(w, 12), reg(w, 0))));
    m.push(Matcher::new("REV16", "cccc011010111111dddd11111011mmmm",
        |v, w| v.arm_rev16(cond(w), reg(w, 12), reg(w, 0))));

    // -- Load/store word and byte --
    m.push(Matcher::new("LDR (imm)", "cccc010pu0w1nnnnttttvvvvvvvvvvvv",
        |v, w| v.arm_ldr_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 0, 12))));
    m.push(Matcher::new("STR (imm)", "cccc010pu0w0nnnnttttvvvvvvvvvvvv",
        |v, w| v.arm_str_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 0, 12))));
    m.push(Matcher::new("LDRB (imm)", "cccc010pu1w1nnnnttttvvvvvvvvvvvv",
        |v, w| v.arm_ldrb_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 0, 12))));
    m.push(Matcher::new("STRB (imm)", "cccc010pu1w0nnnnttttvvvvvvvvvvvv",
        |v, w| v.arm_strb_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 0, 12))));
    m.push(Matcher::new("LDR (reg)", "cccc011pu0w1nnnnttttvvvvvrr0mmmm",
        |v, w| v.arm_ldr_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("STR (reg)", "cccc011pu0w0nnnnttttvvvvvrr0mmmm",
        |v, w| v.arm_str_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("LDRB (reg)", "cccc011pu1w1nnnnttttvvvvvrr0mmmm",
        |v, w| v.arm_ldrb_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));
    m.push(Matcher::new("STRB (reg)", "cccc011pu1w0nnnnttttvvvvvrr0mmmm",
        |v, w| v.arm_strb_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), bits(w, 7, 5), stype(w), reg(w, 0))));

    // -- Load/store halfword and signed --
    m.push(Matcher::new("LDRH (imm)", "cccc000pu1w1nnnnttttvvvv1011vvvv",
        |v, w| v.arm_ldrh_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), (bits(w, 8, 4) << 4) | bits(w, 0, 4))));
    m.push(Matcher::new("STRH (imm)", "cccc000pu1w0nnnnttttvvvv1011vvvv",
        |v, w| v.arm_strh_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), (bits(w, 8, 4) << 4) | bits(w, 0, 4))));
    m.push(Matcher::new("LDRH (reg)", "cccc000pu0w1nnnntttt00001011mmmm",
        |v, w| v.arm_ldrh_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), reg(w, 0))));
    m.push(Matcher::new("STRH (reg)", "cccc000pu0w0nnnntttt00001011mmmm",
        |v, w| v.arm_strh_reg(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), reg(w, 0))));
    m.push(Matcher::new("LDRSB (imm)", "cccc000pu1w1nnnnttttvvvv1101vvvv",
        |v, w| v.arm_ldrsb_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), (bits(w, 8, 4) << 4) | bits(w, 0, 4))));
    m.push(Matcher::new("LDRSH (imm)", "cccc000pu1w1nnnnttttvvvv1111vvvv",
        |v, w| v.arm_ldrsh_imm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), reg(w, 12), (bits(w, 8, 4) << 4) | bits(w, 0, 4))));

    // -- Load/store multiple --
    m.push(Matcher::new("LDM", "cccc100pu0w1nnnnxxxxxxxxxxxxxxxx",
        |v, w| v.arm_ldm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), bits(w, 0, 16))));
    m.push(Matcher::new("STM", "cccc100pu0w0nnnnxxxxxxxxxxxxxxxx",
        |v, w| v.arm_stm(cond(w), bit(w, 24), bit(w, 23), bit(w, 21), reg(w, 16), bits(w, 0, 16))));

    // -- Synchronization --
    m.push(Matcher::new("SWP", "cccc00010000nnnntttt00001001ssss",
        |v, w| v.arm_swp(cond(w), reg(w, 16), reg(w, 12), reg(w, 0))));
    m.push(Matcher::new("SWPB", "cccc00010100nnnntttt00001001ssss",
        |v, w| v.arm_swpb(cond(w), reg(w, 16), reg(w, 12), reg(w, 0))));

    // -- Branches --
    m.push(Matcher::new("B", "cccc1010vvvvvvvvvvvvvvvvvvvvvvvv",
        |v, w| v.arm_b(cond(w), bits(w, 0, 24))));
    m.push(Matcher::new("BL", "cccc1011vvvvvvvvvvvvvvvvvvvvvvvv",
        |v, w| v.arm_bl(cond(w), bits(w, 0, 24))));
    m.push(Matcher::new("BX", "cccc000100101111111111110001mmmm",
        |v, w| v.arm_bx(cond(w), reg(w, 0))));
    m.push(Matcher::new("BLX (reg)", "cccc000100101111111111110011mmmm",
        |v, w| v.arm_blx_reg(cond(w), reg(w, 0))));

    // -- Status register transfer --
    m.push(Matcher::new("MRS", "cccc000100001111dddd000000000000",
        |v, w| v.arm_mrs(cond(w), reg(w, 12))));
    m.push(Matcher::new("MSR (imm)", "cccc00110010mmmm1111rrrrvvvvvvvv",
        |v, w| v.arm_msr_imm(cond(w), bits(w, 16, 4), bits(w, 8, 4), bits(w, 0, 8))));
    m.push(Matcher::new("MSR (reg)", "cccc00010010mmmm111100000000nnnn",
        |v, w| v.arm_msr_reg(cond(w), bits(w, 16, 4), reg(w, 0))));
    m.push(Matcher::new("NOP", "cccc0011001000001111000000000000",
        |v, w| v.arm_nop(cond(w))));

    // -- Exception generation --
    m.push(Matcher::new("SVC", "cccc1111vvvvvvvvvvvvvvvvvvvvvvvv",
        |v, w| v.arm_svc(cond(w), bits(w, 0, 24))));
    m.push(Matcher::new("BKPT", "cccc00010010vvvvvvvvvvvv0111kkkk",
        |v, w| v.arm_bkpt(cond(w), bits(w, 8, 12), bits(w, 0, 4))));
    m.push(Matcher::new("UDF", "111001111111vvvvvvvvvvvv1111vvvv",
        |v, _| v.arm_udf()));

    DecodeTable::new(m)
}
