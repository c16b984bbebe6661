//! Supervisor calls, breakpoints and the permanently-undefined space.

use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, Cond, Exception};

use super::ArmTranslatorVisitor;

impl ArmTranslatorVisitor {
    pub fn arm_svc(&mut self, cond: Cond, imm24: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let next = self.ir.current_location.advance_pc(4);
        let pc = self.ir.imm32(next.pc() as u32);
        self.ir.set_register(A32Reg::PC, pc);
        let swi = self.ir.imm32(imm24);
        self.ir.call_supervisor(swi);
        self.ir
            .set_term(Terminal::CheckHalt(Box::new(Terminal::LinkBlock(next))));
        false
    }

    pub fn arm_bkpt(&mut self, cond: Cond, _imm12: u32, _imm4: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        self.raise_exception(Exception::Breakpoint)
    }

    pub fn arm_udf(&mut self) -> bool {
        self.undefined_instruction()
    }
}
