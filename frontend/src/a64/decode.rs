//! A64 decode table.

use once_cell::sync::Lazy;

use dbt_ir::Cond;

use crate::decoder::{bit, bits, DecodeTable, Matcher};

use super::instructions::A64Shift;
use super::A64TranslatorVisitor;

type V = A64TranslatorVisitor;

pub fn a64_table() -> &'static DecodeTable<V> {
    static TABLE: Lazy<DecodeTable<A64TranslatorVisitor>> = Lazy::new(build);
    &TABLE
}

#[rustfmt::skip]
fn build() -> DecodeTable<V> {
    let mut m: Vec<Matcher<V>> = Vec::new();

    // -- Data processing (immediate) --
    m.push(Matcher::new("ADD/SUB (imm)", "zoS100010hvvvvvvvvvvvvnnnnnddddd",
        |v, w| v.a64_add_sub_imm(bit(w, 31), bit(w, 30), bit(w, 29), bit(w, 22),
            bits(w, 10, 12), bits(w, 5, 5), bits(w, 0, 5))));
    m.push(Matcher::new("MOVN", "z00100101hhvvvvvvvvvvvvvvvvddddd",
        |v, w| v.a64_movn(bit(w, 31), bits(w, 21, 2), bits(w, 5, 16), bits(w, 0, 5))));
    m.push(Matcher::new("MOVZ", "z10100101hhvvvvvvvvvvvvvvvvddddd",
        |v, w| v.a64_movz(bit(w, 31), bits(w, 21, 2), bits(w, 5, 16), bits(w, 0, 5))));
    m.push(Matcher::new("MOVK", "z11100101hhvvvvvvvvvvvvvvvvddddd",
        |v, w| v.a64_movk(bit(w, 31), bits(w, 21, 2), bits(w, 5, 16), bits(w, 0, 5))));
    m.push(Matcher::new("ADR", "0ll10000hhhhhhhhhhhhhhhhhhhddddd",
        |v, w| v.a64_adr(bits(w, 29, 2), bits(w, 5, 19), bits(w, 0, 5))));
    m.push(Matcher::new("ADRP", "1ll10000hhhhhhhhhhhhhhhhhhhddddd",
        |v, w| v.a64_adrp(bits(w, 29, 2), bits(w, 5, 19), bits(w, 0, 5))));

    // -- Data processing (register) --
    m.push(Matcher::new("ADD/SUB (shifted reg)", "zoS01011ss0mmmmmvvvvvvnnnnnddddd",
        |v, w| v.a64_add_sub_shifted(bit(w, 31), bit(w, 30), bit(w, 29),
            A64Shift::from_bits(bits(w, 22, 2)), bits(w, 16, 5), bits(w, 10, 6),
            bits(w, 5, 5), bits(w, 0, 5))));
    m.push(Matcher::new("Logical (shifted reg)", "zoo01010ss0mmmmmvvvvvvnnnnnddddd",
        |v, w| v.a64_logical_shifted(bit(w, 31), bits(w, 29, 2),
            A64Shift::from_bits(bits(w, 22, 2)), bits(w, 16, 5), bits(w, 10, 6),
            bits(w, 5, 5), bits(w, 0, 5))));
    m.push(Matcher::new("CSEL", "z0011010100mmmmmcccc00nnnnnddddd",
        |v, w| v.a64_csel(bit(w, 31), bits(w, 16, 5),
            Cond::from_bits(bits(w, 12, 4)), bits(w, 5, 5), bits(w, 0, 5))));

    // -- Load/store (unsigned immediate) --
    m.push(Matcher::new("LDR/STR (unsigned imm)", "zz1110010ovvvvvvvvvvvvnnnnnttttt",
        |v, w| v.a64_ldr_str_imm(bits(w, 30, 2), bit(w, 22),
            bits(w, 10, 12), bits(w, 5, 5), bits(w, 0, 5))));

    // -- Branches --
    m.push(Matcher::new("B", "000101vvvvvvvvvvvvvvvvvvvvvvvvvv",
        |v, w| v.a64_b(bits(w, 0, 26))));
    m.push(Matcher::new("BL", "100101vvvvvvvvvvvvvvvvvvvvvvvvvv",
        |v, w| v.a64_bl(bits(w, 0, 26))));
    m.push(Matcher::new("B.cond", "01010100vvvvvvvvvvvvvvvvvvv0cccc",
        |v, w| v.a64_b_cond(bits(w, 5, 19), Cond::from_bits(bits(w, 0, 4)))));
    m.push(Matcher::new("CBZ/CBNZ", "z011010ovvvvvvvvvvvvvvvvvvvttttt",
        |v, w| v.a64_cbz_cbnz(bit(w, 31), bit(w, 24), bits(w, 5, 19), bits(w, 0, 5))));
    m.push(Matcher::new("BR", "1101011000011111000000nnnnn00000",
        |v, w| v.a64_br(bits(w, 5, 5))));
    m.push(Matcher::new("BLR", "1101011000111111000000nnnnn00000",
        |v, w| v.a64_blr(bits(w, 5, 5))));
    m.push(Matcher::new("RET", "1101011001011111000000nnnnn00000",
        |v, w| v.a64_ret(bits(w, 5, 5))));

    // -- Exception generation / hints --
    m.push(Matcher::new("SVC", "11010100000vvvvvvvvvvvvvvvv00001",
        |v, w| v.a64_svc(bits(w, 5, 16))));
    m.push(Matcher::new("BRK", "11010100001vvvvvvvvvvvvvvvv00000",
        |v, w| v.a64_brk(bits(w, 5, 16))));
    m.push(Matcher::new("NOP", "11010101000000110010000000011111",
        |v, _| v.a64_nop()));

    DecodeTable::new(m)
}
