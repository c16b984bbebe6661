//! Load/store (word, byte, halfword, signed, multiple).

use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, Cond, Value};

use super::{ArmTranslatorVisitor, ShiftType};

impl ArmTranslatorVisitor {
    /// Shared P/U/W addressing: returns the access address and performs
    /// base-register writeback. The writeback happens before the loaded
    /// value is written, so a load into the base wins.
    fn scalar_address(
        &mut self,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        offset: Value,
    ) -> Value {
        let base = self.reg(n);
        let offset_addr = if u {
            self.ir.add(base, offset)
        } else {
            self.ir.sub(base, offset)
        };
        let address = if p { offset_addr } else { base };
        if !p || w {
            self.ir.set_register(n, offset_addr);
        }
        address
    }

    /// A load into R15 is an interworking branch; returns are predicted
    /// through the RSB.
    fn load_result(&mut self, t: A32Reg, data: Value) -> bool {
        if t == A32Reg::PC {
            self.bx_write_pc(data);
            self.ir.set_term(Terminal::PopRSBHint);
            false
        } else {
            self.ir.set_register(t, data);
            true
        }
    }

    // -- Word / byte, immediate offset --

    pub fn arm_ldr_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm12: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.ir.imm32(imm12);
        let address = self.scalar_address(p, u, w, n, offset);
        let data = self.read_memory_32(address);
        self.load_result(t, data)
    }

    pub fn arm_str_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm12: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let offset = self.ir.imm32(imm12);
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_32(address, value);
        true
    }

    pub fn arm_ldrb_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm12: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.ir.imm32(imm12);
        let address = self.scalar_address(p, u, w, n, offset);
        let byte = self.read_memory_8(address);
        let data = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    pub fn arm_strb_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm12: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let byte = self.ir.least_significant_byte(value);
        let offset = self.ir.imm32(imm12);
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_8(address, byte);
        true
    }

    // -- Word / byte, register offset --

    #[allow(clippy::too_many_arguments)]
    pub fn arm_ldr_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let carry = self.ir.get_c_flag();
        let index = self.reg(m);
        let offset = self.emit_imm_shift(index, stype, imm5, carry).result;
        let address = self.scalar_address(p, u, w, n, offset);
        let data = self.read_memory_32(address);
        self.load_result(t, data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_str_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let carry = self.ir.get_c_flag();
        let index = self.reg(m);
        let offset = self.emit_imm_shift(index, stype, imm5, carry).result;
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_32(address, value);
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_ldrb_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if t == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let carry = self.ir.get_c_flag();
        let index = self.reg(m);
        let offset = self.emit_imm_shift(index, stype, imm5, carry).result;
        let address = self.scalar_address(p, u, w, n, offset);
        let byte = self.read_memory_8(address);
        let data = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_strb_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if t == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let byte = self.ir.least_significant_byte(value);
        let carry = self.ir.get_c_flag();
        let index = self.reg(m);
        let offset = self.emit_imm_shift(index, stype, imm5, carry).result;
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_8(address, byte);
        true
    }

    // -- Halfword / signed, immediate and register offset --

    #[allow(clippy::too_many_arguments)]
    pub fn arm_ldrh_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm8: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.ir.imm32(imm8);
        let address = self.scalar_address(p, u, w, n, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_strh_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm8: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let half = self.ir.least_significant_half(value);
        let offset = self.ir.imm32(imm8);
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_16(address, half);
        true
    }

    pub fn arm_ldrh_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        m: A32Reg,
    ) -> bool {
        if t == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.reg(m);
        let address = self.scalar_address(p, u, w, n, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    pub fn arm_strh_reg(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        m: A32Reg,
    ) -> bool {
        if t == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let value = self.reg(t);
        let half = self.ir.least_significant_half(value);
        let offset = self.reg(m);
        let address = self.scalar_address(p, u, w, n, offset);
        self.write_memory_16(address, half);
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_ldrsb_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm8: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.ir.imm32(imm8);
        let address = self.scalar_address(p, u, w, n, offset);
        let byte = self.read_memory_8(address);
        let data = self.ir.sign_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arm_ldrsh_imm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        t: A32Reg,
        imm8: u32,
    ) -> bool {
        if t == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let offset = self.ir.imm32(imm8);
        let address = self.scalar_address(p, u, w, n, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.sign_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    // -- Load/store multiple --

    pub fn arm_ldm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        list: u32,
    ) -> bool {
        if n == A32Reg::PC || list == 0 {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let count = list.count_ones();
        let base = self.reg(n);
        // Lowest address accessed, regardless of direction.
        let start = match (p, u) {
            (false, true) => base,
            (true, true) => {
                let four = self.ir.imm32(4);
                self.ir.add(base, four)
            }
            (false, false) => {
                let size = self.ir.imm32(4 * (count - 1));
                self.ir.sub(base, size)
            }
            (true, false) => {
                let size = self.ir.imm32(4 * count);
                self.ir.sub(base, size)
            }
        };
        if w {
            let size = self.ir.imm32(4 * count);
            let new_base = if u {
                self.ir.add(base, size)
            } else {
                self.ir.sub(base, size)
            };
            self.ir.set_register(n, new_base);
        }
        let mut address = start;
        let mut result = true;
        for i in 0..16 {
            if list & (1 << i) == 0 {
                continue;
            }
            let data = self.read_memory_32(address);
            result = self.load_result(A32Reg::from_bits(i), data);
            let four = self.ir.imm32(4);
            address = self.ir.add(address, four);
        }
        result
    }

    pub fn arm_stm(
        &mut self,
        cond: Cond,
        p: bool,
        u: bool,
        w: bool,
        n: A32Reg,
        list: u32,
    ) -> bool {
        if n == A32Reg::PC || list == 0 {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let count = list.count_ones();
        let base = self.reg(n);
        let start = match (p, u) {
            (false, true) => base,
            (true, true) => {
                let four = self.ir.imm32(4);
                self.ir.add(base, four)
            }
            (false, false) => {
                let size = self.ir.imm32(4 * (count - 1));
                self.ir.sub(base, size)
            }
            (true, false) => {
                let size = self.ir.imm32(4 * count);
                self.ir.sub(base, size)
            }
        };
        let mut address = start;
        for i in 0..16 {
            if list & (1 << i) == 0 {
                continue;
            }
            let value = self.reg(A32Reg::from_bits(i));
            self.write_memory_32(address, value);
            let four = self.ir.imm32(4);
            address = self.ir.add(address, four);
        }
        if w {
            let size = self.ir.imm32(4 * count);
            let new_base = if u {
                self.ir.add(base, size)
            } else {
                self.ir.sub(base, size)
            };
            self.ir.set_register(n, new_base);
        }
        true
    }
}
