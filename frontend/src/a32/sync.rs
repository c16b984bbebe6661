//! Synchronization primitives: SWP/SWPB.
//!
//! The swap is lowered as a read followed by a write through the
//! ordinary memory opcodes; atomicity against other host threads is the
//! embedder's concern, matching the single-threaded execution model.

use dbt_ir::{A32Reg, Cond};

use super::ArmTranslatorVisitor;

impl ArmTranslatorVisitor {
    pub fn arm_swp(&mut self, cond: Cond, n: A32Reg, t: A32Reg, t2: A32Reg) -> bool {
        if t == A32Reg::PC || t2 == A32Reg::PC || n == A32Reg::PC || n == t || n == t2 {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let addr = self.reg(n);
        let data = self.read_memory_32(addr);
        let store = self.reg(t2);
        let addr2 = self.reg(n);
        self.write_memory_32(addr2, store);
        self.ir.set_register(t, data);
        true
    }

    pub fn arm_swpb(&mut self, cond: Cond, n: A32Reg, t: A32Reg, t2: A32Reg) -> bool {
        if t == A32Reg::PC || t2 == A32Reg::PC || n == A32Reg::PC || n == t || n == t2 {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let addr = self.reg(n);
        let byte = self.read_memory_8(addr);
        let data = self.ir.zero_extend_byte_to_word(byte);
        let store_word = self.reg(t2);
        let store = self.ir.least_significant_byte(store_word);
        let addr2 = self.reg(n);
        self.write_memory_8(addr2, store);
        self.ir.set_register(t, data);
        true
    }
}
