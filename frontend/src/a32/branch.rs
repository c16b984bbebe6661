//! Branch instructions.

use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, Cond};

use super::ArmTranslatorVisitor;

impl ArmTranslatorVisitor {
    pub fn arm_b(&mut self, cond: Cond, imm24: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = ((imm24 << 8) as i32 >> 8) * 4 + 8;
        let target = self
            .ir
            .current_location
            .advance_pc(offset as i64 as u64);
        if cond == Cond::AL {
            self.ir.set_term(Terminal::LinkBlockFast(target));
        } else {
            // Conditional back-edges carry the cycle check.
            self.ir.set_term(Terminal::LinkBlock(target));
        }
        false
    }

    pub fn arm_bl(&mut self, cond: Cond, imm24: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let return_location = self.ir.current_location.advance_pc(4);
        self.ir.push_rsb(return_location);
        let lr = self.ir.imm32(return_location.pc() as u32);
        self.ir.set_register(A32Reg::LR, lr);
        let offset = ((imm24 << 8) as i32 >> 8) * 4 + 8;
        let target = self
            .ir
            .current_location
            .advance_pc(offset as i64 as u64);
        self.ir.set_term(Terminal::LinkBlock(target));
        false
    }

    pub fn arm_bx(&mut self, cond: Cond, m: A32Reg) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let target = self.reg(m);
        self.bx_write_pc(target);
        self.ir.set_term(Terminal::PopRSBHint);
        false
    }

    pub fn arm_blx_reg(&mut self, cond: Cond, m: A32Reg) -> bool {
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let return_location = self.ir.current_location.advance_pc(4);
        self.ir.push_rsb(return_location);
        let lr = self.ir.imm32(return_location.pc() as u32);
        self.ir.set_register(A32Reg::LR, lr);
        let target = self.reg(m);
        self.bx_write_pc(target);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }
}
