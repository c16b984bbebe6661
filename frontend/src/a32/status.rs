//! Status register transfer (MRS/MSR). Only the application-level
//! fields are implemented: the flags byte and, for reads, the whole
//! CPSR as stored.

use dbt_ir::{A32Reg, Cond};

use super::ArmTranslatorVisitor;

impl ArmTranslatorVisitor {
    pub fn arm_mrs(&mut self, cond: Cond, d: A32Reg) -> bool {
        if d == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let cpsr = self.ir.get_cpsr();
        self.ir.set_register(d, cpsr);
        true
    }

    pub fn arm_msr_imm(&mut self, cond: Cond, mask: u32, rotate: u32, imm8: u32) -> bool {
        // Only the flags field (mask bit 3) is supported.
        if mask != 0b1000 {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let n = self.ir.imm1(imm32 & (1 << 31) != 0);
        self.ir.set_n_flag(n);
        let z = self.ir.imm1(imm32 & (1 << 30) != 0);
        self.ir.set_z_flag(z);
        let c = self.ir.imm1(imm32 & (1 << 29) != 0);
        self.ir.set_c_flag(c);
        let v = self.ir.imm1(imm32 & (1 << 28) != 0);
        self.ir.set_v_flag(v);
        true
    }

    pub fn arm_msr_reg(&mut self, cond: Cond, mask: u32, n_reg: A32Reg) -> bool {
        if mask != 0b1000 || n_reg == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(n_reg);
        let n = self.ir.test_bit(value, 31);
        self.ir.set_n_flag(n);
        let z = self.ir.test_bit(value, 30);
        self.ir.set_z_flag(z);
        let c = self.ir.test_bit(value, 29);
        self.ir.set_c_flag(c);
        let v = self.ir.test_bit(value, 28);
        self.ir.set_v_flag(v);
        true
    }
}
