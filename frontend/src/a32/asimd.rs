//! Advanced SIMD decode table and visitor methods.
//!
//! These live in the unconditional (first byte `1111…`) encoding space.
//! Only the quad-register (Q = 1) forms are translated; doubleword
//! forms fall through to the undefined path.

use once_cell::sync::Lazy;

use dbt_ir::{A32ExtReg, Value};

use crate::decoder::{bit, bits, DecodeTable, Matcher};

use super::ArmTranslatorVisitor;

/// Quad register from the D:Vd field; must be even.
fn qreg(base: u32, d: bool) -> Option<A32ExtReg> {
    let index = (u32::from(d) << 4) | base;
    if index % 2 != 0 {
        return None;
    }
    Some(A32ExtReg::quad(index / 2))
}

type V = ArmTranslatorVisitor;

pub fn table() -> &'static DecodeTable<V> {
    static TABLE: Lazy<DecodeTable<ArmTranslatorVisitor>> = Lazy::new(build);
    &TABLE
}

#[rustfmt::skip]
fn build() -> DecodeTable<V> {
    let mut m: Vec<Matcher<V>> = Vec::new();

    m.push(Matcher::new("VADD (int)", "111100100Dzznnnndddd1000NQM0mmmm",
        |v, w| v.asimd_vadd(bit(w, 6), 8 << bits(w, 20, 2),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 16, 4), bit(w, 7)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VSUB (int)", "111100110Dzznnnndddd1000NQM0mmmm",
        |v, w| v.asimd_vsub(bit(w, 6), 8 << bits(w, 20, 2),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 16, 4), bit(w, 7)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VAND (reg)", "111100100D00nnnndddd0001NQM1mmmm",
        |v, w| v.asimd_vand(bit(w, 6),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 16, 4), bit(w, 7)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VORR (reg)", "111100100D10nnnndddd0001NQM1mmmm",
        |v, w| v.asimd_vorr(bit(w, 6),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 16, 4), bit(w, 7)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VEOR (reg)", "111100110D00nnnndddd0001NQM1mmmm",
        |v, w| v.asimd_veor(bit(w, 6),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 16, 4), bit(w, 7)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VMVN (reg)", "111100111D110000dddd01011QM0mmmm",
        |v, w| v.asimd_vmvn(bit(w, 6),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VABS", "111100111D11zz01dddd00110QM0mmmm",
        |v, w| v.asimd_vabs(bit(w, 6), 8 << bits(w, 18, 2),
            qreg(bits(w, 12, 4), bit(w, 22)), qreg(bits(w, 0, 4), bit(w, 5)))));

    DecodeTable::new(m)
}

impl ArmTranslatorVisitor {
    fn asimd_binary(
        &mut self,
        q: bool,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
        op: impl FnOnce(&mut dbt_ir::IrEmitter, Value, Value) -> Value,
    ) -> bool {
        let (Some(d), Some(n), Some(m)) = (d, n, m) else {
            return self.undefined_instruction();
        };
        if !q {
            return self.undefined_instruction();
        }
        let a = self.ir.get_q(n);
        let b = self.ir.get_q(m);
        let result = op(&mut self.ir, a, b);
        self.ir.set_q(d, result);
        true
    }

    pub fn asimd_vadd(
        &mut self,
        q: bool,
        esize: u32,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        self.asimd_binary(q, d, n, m, |ir, a, b| ir.vector_add(esize, a, b))
    }

    pub fn asimd_vsub(
        &mut self,
        q: bool,
        esize: u32,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        self.asimd_binary(q, d, n, m, |ir, a, b| ir.vector_sub(esize, a, b))
    }

    pub fn asimd_vand(
        &mut self,
        q: bool,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        self.asimd_binary(q, d, n, m, |ir, a, b| ir.vector_and(a, b))
    }

    pub fn asimd_vorr(
        &mut self,
        q: bool,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        self.asimd_binary(q, d, n, m, |ir, a, b| ir.vector_or(a, b))
    }

    pub fn asimd_veor(
        &mut self,
        q: bool,
        d: Option<A32ExtReg>,
        n: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        self.asimd_binary(q, d, n, m, |ir, a, b| ir.vector_eor(a, b))
    }

    pub fn asimd_vmvn(&mut self, q: bool, d: Option<A32ExtReg>, m: Option<A32ExtReg>) -> bool {
        let (Some(d), Some(m)) = (d, m) else {
            return self.undefined_instruction();
        };
        if !q {
            return self.undefined_instruction();
        }
        let a = self.ir.get_q(m);
        let result = self.ir.vector_not(a);
        self.ir.set_q(d, result);
        true
    }

    pub fn asimd_vabs(
        &mut self,
        q: bool,
        esize: u32,
        d: Option<A32ExtReg>,
        m: Option<A32ExtReg>,
    ) -> bool {
        let (Some(d), Some(m)) = (d, m) else {
            return self.undefined_instruction();
        };
        if !q || esize > 32 {
            return self.undefined_instruction();
        }
        let a = self.ir.get_q(m);
        let result = self.ir.vector_abs(esize, a);
        self.ir.set_q(d, result);
        true
    }
}
