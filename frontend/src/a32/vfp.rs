//! VFP decode table and visitor methods (scalar floating point).
//!
//! The `z` bit selects precision: 0 = single (S registers, Vx = x:X),
//! 1 = double (D registers, Vx = X:x). Unconditional encodings (cond
//! `1111`) never reach this table; the translate loop pre-checks.

use once_cell::sync::Lazy;

use dbt_ir::{A32ExtReg, A32Reg, Cond, Value};

use crate::decoder::{bit, bits, DecodeTable, Matcher};

use super::ArmTranslatorVisitor;

fn cond(w: u32) -> Cond {
    Cond::from_bits(bits(w, 28, 4))
}

/// Single: index = Vx:x-bit; double: index = x-bit:Vx.
fn vreg(dp: bool, base: u32, extra: bool) -> A32ExtReg {
    if dp {
        A32ExtReg::double((u32::from(extra) << 4) | base)
    } else {
        A32ExtReg::single((base << 1) | u32::from(extra))
    }
}

type V = ArmTranslatorVisitor;

pub fn table() -> &'static DecodeTable<V> {
    static TABLE: Lazy<DecodeTable<ArmTranslatorVisitor>> = Lazy::new(build);
    &TABLE
}

#[rustfmt::skip]
fn build() -> DecodeTable<V> {
    let mut m: Vec<Matcher<V>> = Vec::new();

    m.push(Matcher::new("VADD", "cccc11100D11nnnndddd101zN0M0mmmm",
        |v, w| v.vfp_vadd(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 16, 4), bit(w, 7)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VSUB", "cccc11100D11nnnndddd101zN1M0mmmm",
        |v, w| v.vfp_vsub(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 16, 4), bit(w, 7)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VMUL", "cccc11100D10nnnndddd101zN0M0mmmm",
        |v, w| v.vfp_vmul(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 16, 4), bit(w, 7)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VDIV", "cccc11101D00nnnndddd101zN0M0mmmm",
        |v, w| v.vfp_vdiv(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 16, 4), bit(w, 7)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VABS", "cccc11101D110000dddd101z11M0mmmm",
        |v, w| v.vfp_vabs(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VNEG", "cccc11101D110001dddd101z01M0mmmm",
        |v, w| v.vfp_vneg(cond(w), bit(w, 8),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)),
            vreg(bit(w, 8), bits(w, 0, 4), bit(w, 5)))));
    m.push(Matcher::new("VMOV (core to s)", "cccc11100000nnnntttt1010N0010000",
        |v, w| v.vfp_vmov_core_to_single(cond(w),
            vreg(false, bits(w, 16, 4), bit(w, 7)), A32Reg::from_bits(bits(w, 12, 4)))));
    m.push(Matcher::new("VMOV (s to core)", "cccc11100001nnnntttt1010N0010000",
        |v, w| v.vfp_vmov_single_to_core(cond(w),
            A32Reg::from_bits(bits(w, 12, 4)), vreg(false, bits(w, 16, 4), bit(w, 7)))));
    m.push(Matcher::new("VLDR", "cccc1101UD01nnnndddd101zvvvvvvvv",
        |v, w| v.vfp_vldr(cond(w), bit(w, 23), bit(w, 8),
            A32Reg::from_bits(bits(w, 16, 4)),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)), bits(w, 0, 8))));
    m.push(Matcher::new("VSTR", "cccc1101UD00nnnndddd101zvvvvvvvv",
        |v, w| v.vfp_vstr(cond(w), bit(w, 23), bit(w, 8),
            A32Reg::from_bits(bits(w, 16, 4)),
            vreg(bit(w, 8), bits(w, 12, 4), bit(w, 22)), bits(w, 0, 8))));

    DecodeTable::new(m)
}

impl ArmTranslatorVisitor {
    fn vfp_binary(
        &mut self,
        cond: Cond,
        dp: bool,
        d: A32ExtReg,
        n: A32ExtReg,
        m: A32ExtReg,
        f32_op: fn(&mut dbt_ir::IrEmitter, Value, Value) -> Value,
        f64_op: fn(&mut dbt_ir::IrEmitter, Value, Value) -> Value,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        if dp {
            let a = self.ir.get_ext_reg64(n);
            let b = self.ir.get_ext_reg64(m);
            let result = f64_op(&mut self.ir, a, b);
            self.ir.set_ext_reg64(d, result);
        } else {
            let a = self.ir.get_ext_reg32(n);
            let b = self.ir.get_ext_reg32(m);
            let result = f32_op(&mut self.ir, a, b);
            self.ir.set_ext_reg32(d, result);
        }
        true
    }

    pub fn vfp_vadd(&mut self, cond: Cond, dp: bool, d: A32ExtReg, n: A32ExtReg, m: A32ExtReg) -> bool {
        self.vfp_binary(cond, dp, d, n, m, dbt_ir::IrEmitter::fp_add_32, dbt_ir::IrEmitter::fp_add_64)
    }

    pub fn vfp_vsub(&mut self, cond: Cond, dp: bool, d: A32ExtReg, n: A32ExtReg, m: A32ExtReg) -> bool {
        self.vfp_binary(cond, dp, d, n, m, dbt_ir::IrEmitter::fp_sub_32, dbt_ir::IrEmitter::fp_sub_64)
    }

    pub fn vfp_vmul(&mut self, cond: Cond, dp: bool, d: A32ExtReg, n: A32ExtReg, m: A32ExtReg) -> bool {
        self.vfp_binary(cond, dp, d, n, m, dbt_ir::IrEmitter::fp_mul_32, dbt_ir::IrEmitter::fp_mul_64)
    }

    pub fn vfp_vdiv(&mut self, cond: Cond, dp: bool, d: A32ExtReg, n: A32ExtReg, m: A32ExtReg) -> bool {
        self.vfp_binary(cond, dp, d, n, m, dbt_ir::IrEmitter::fp_div_32, dbt_ir::IrEmitter::fp_div_64)
    }

    pub fn vfp_vabs(&mut self, cond: Cond, dp: bool, d: A32ExtReg, m: A32ExtReg) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        if dp {
            let a = self.ir.get_ext_reg64(m);
            let result = self.ir.fp_abs_64(a);
            self.ir.set_ext_reg64(d, result);
        } else {
            let a = self.ir.get_ext_reg32(m);
            let result = self.ir.fp_abs_32(a);
            self.ir.set_ext_reg32(d, result);
        }
        true
    }

    pub fn vfp_vneg(&mut self, cond: Cond, dp: bool, d: A32ExtReg, m: A32ExtReg) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        if dp {
            let a = self.ir.get_ext_reg64(m);
            let result = self.ir.fp_neg_64(a);
            self.ir.set_ext_reg64(d, result);
        } else {
            let a = self.ir.get_ext_reg32(m);
            let result = self.ir.fp_neg_32(a);
            self.ir.set_ext_reg32(d, result);
        }
        true
    }

    pub fn vfp_vmov_core_to_single(&mut self, cond: Cond, n: A32ExtReg, t: A32Reg) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let fp = self.ir.transfer_to_fp32(value);
        self.ir.set_ext_reg32(n, fp);
        true
    }

    pub fn vfp_vmov_single_to_core(&mut self, cond: Cond, t: A32Reg, n: A32ExtReg) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let fp = self.ir.get_ext_reg32(n);
        let value = self.ir.transfer_from_fp32(fp);
        self.ir.set_register(t, value);
        true
    }

    pub fn vfp_vldr(
        &mut self,
        cond: Cond,
        u: bool,
        dp: bool,
        n: A32Reg,
        d: A32ExtReg,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let base = if n == A32Reg::PC {
            let pc = self.ir.current_location.pc() as u32;
            self.ir.imm32(pc.wrapping_add(8) & !3)
        } else {
            self.reg(n)
        };
        let offset = self.ir.imm32(imm8 * 4);
        let address = if u {
            self.ir.add(base, offset)
        } else {
            self.ir.sub(base, offset)
        };
        if dp {
            let lo = self.read_memory_32(address);
            let four = self.ir.imm32(4);
            let hi_addr = self.ir.add(address, four);
            let hi = self.read_memory_32(hi_addr);
            let packed = self.ir.pack_2x32_to_1x64(lo, hi);
            let fp = self.ir.transfer_to_fp64(packed);
            self.ir.set_ext_reg64(d, fp);
        } else {
            let data = self.read_memory_32(address);
            let fp = self.ir.transfer_to_fp32(data);
            self.ir.set_ext_reg32(d, fp);
        }
        true
    }

    pub fn vfp_vstr(
        &mut self,
        cond: Cond,
        u: bool,
        dp: bool,
        n: A32Reg,
        d: A32ExtReg,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let base = if n == A32Reg::PC {
            let pc = self.ir.current_location.pc() as u32;
            self.ir.imm32(pc.wrapping_add(8) & !3)
        } else {
            self.reg(n)
        };
        let offset = self.ir.imm32(imm8 * 4);
        let address = if u {
            self.ir.add(base, offset)
        } else {
            self.ir.sub(base, offset)
        };
        if dp {
            let fp = self.ir.get_ext_reg64(d);
            let packed = self.ir.transfer_from_fp64(fp);
            let lo = self.ir.least_significant_word(packed);
            self.write_memory_32(address, lo);
            let hi = self.ir.most_significant_word(packed);
            let four = self.ir.imm32(4);
            let hi_addr = self.ir.add(address, four);
            self.write_memory_32(hi_addr, hi);
        } else {
            let fp = self.ir.get_ext_reg32(d);
            let data = self.ir.transfer_from_fp32(fp);
            self.write_memory_32(address, data);
        }
        true
    }
}
