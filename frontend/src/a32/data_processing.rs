//! Data-processing, multiply, divide, CLZ, extension and byte-reverse
//! instructions.

use dbt_ir::{A32Reg, Cond, Value};

use super::{ArmTranslatorVisitor, ShiftType};

impl ArmTranslatorVisitor {
    /// Shifter operand for the register forms: Rm shifted by an
    /// immediate amount. Returns (value, shifter carry-out).
    fn shifter_reg(&mut self, m: A32Reg, stype: ShiftType, imm5: u32) -> (Value, Value) {
        let carry_in = self.ir.get_c_flag();
        let value = self.reg(m);
        let shifted = self.emit_imm_shift(value, stype, imm5, carry_in);
        (shifted.result, shifted.carry)
    }

    /// Shifter operand for the immediate forms. Returns (value,
    /// shifter carry-out).
    fn shifter_imm(&mut self, rotate: u32, imm8: u32) -> (Value, Value) {
        let carry_in = self.ir.get_c_flag();
        let (imm32, carry) = self.expand_imm_c(rotate, imm8, carry_in);
        let value = self.ir.imm32(imm32);
        (value, carry)
    }

    /// Flag tail of the logical group: N and Z from the result, C from
    /// the shifter, V unchanged.
    fn set_flags_logical(&mut self, result: Value, carry: Value) {
        self.ir.set_nzc_from_result(result, carry);
    }

    fn logical_result(
        &mut self,
        s: bool,
        d: A32Reg,
        operand: (Value, Value),
        result: Value,
    ) -> bool {
        if d == A32Reg::PC {
            if s {
                return self.unpredictable_instruction();
            }
            self.bx_write_pc(result);
            self.ir.set_term(dbt_ir::block::Terminal::ReturnToDispatch);
            return false;
        }
        self.ir.set_register(d, result);
        if s {
            self.set_flags_logical(result, operand.1);
        }
        true
    }

    fn arith_result(&mut self, s: bool, d: A32Reg, result: Value) -> bool {
        if d == A32Reg::PC {
            if s {
                return self.unpredictable_instruction();
            }
            self.bx_write_pc(result);
            self.ir.set_term(dbt_ir::block::Terminal::ReturnToDispatch);
            return false;
        }
        self.ir.set_register(d, result);
        if s {
            self.set_flags_nzcv(result);
        }
        true
    }

    // -- Logical group, register forms --

    pub fn arm_and_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.and_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_eor_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.eor_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_orr_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.or_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_bic_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let inverted = self.ir.not_32(operand.0);
        let result = self.ir.and_32(a, inverted);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_mov_reg(
        &mut self,
        cond: Cond,
        s: bool,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        self.logical_result(s, d, operand, operand.0)
    }

    pub fn arm_mvn_reg(
        &mut self,
        cond: Cond,
        s: bool,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let result = self.ir.not_32(operand.0);
        self.logical_result(s, d, operand, result)
    }

    // -- Logical group, immediate forms --

    pub fn arm_and_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        let a = self.reg(n);
        let result = self.ir.and_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_eor_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        let a = self.reg(n);
        let result = self.ir.eor_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_orr_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        let a = self.reg(n);
        let result = self.ir.or_32(a, operand.0);
        self.logical_result(s, d, operand, result)
    }

    pub fn arm_bic_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let carry_in = self.ir.get_c_flag();
        let (imm32, carry) = self.expand_imm_c(rotate, imm8, carry_in);
        let a = self.reg(n);
        let mask = self.ir.imm32(!imm32);
        let result = self.ir.and_32(a, mask);
        self.logical_result(s, d, (mask, carry), result)
    }

    pub fn arm_mov_imm(
        &mut self,
        cond: Cond,
        s: bool,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        self.logical_result(s, d, operand, operand.0)
    }

    pub fn arm_mvn_imm(
        &mut self,
        cond: Cond,
        s: bool,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let carry_in = self.ir.get_c_flag();
        let (imm32, carry) = self.expand_imm_c(rotate, imm8, carry_in);
        let result = self.ir.imm32(!imm32);
        self.logical_result(s, d, (result, carry), result)
    }

    // -- Arithmetic group, register forms --

    pub fn arm_add_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.add(a, operand);
        self.arith_result(s, d, result)
    }

    pub fn arm_adc_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let c = self.ir.get_c_flag();
        let result = self.ir.add_with_carry(a, operand, c);
        self.arith_result(s, d, result)
    }

    pub fn arm_sub_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.sub(a, operand);
        self.arith_result(s, d, result)
    }

    pub fn arm_sbc_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let c = self.ir.get_c_flag();
        let result = self.ir.sub_with_carry(a, operand, c);
        self.arith_result(s, d, result)
    }

    pub fn arm_rsb_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.sub(operand, a);
        self.arith_result(s, d, result)
    }

    pub fn arm_rsc_reg(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let c = self.ir.get_c_flag();
        let result = self.ir.sub_with_carry(operand, a, c);
        self.arith_result(s, d, result)
    }

    // -- Arithmetic group, immediate forms --

    pub fn arm_add_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let result = self.ir.add(a, b);
        self.arith_result(s, d, result)
    }

    pub fn arm_adc_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let c = self.ir.get_c_flag();
        let result = self.ir.add_with_carry(a, b, c);
        self.arith_result(s, d, result)
    }

    pub fn arm_sub_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let result = self.ir.sub(a, b);
        self.arith_result(s, d, result)
    }

    pub fn arm_sbc_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let c = self.ir.get_c_flag();
        let result = self.ir.sub_with_carry(a, b, c);
        self.arith_result(s, d, result)
    }

    pub fn arm_rsb_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let result = self.ir.sub(b, a);
        self.arith_result(s, d, result)
    }

    pub fn arm_rsc_imm(
        &mut self,
        cond: Cond,
        s: bool,
        n: A32Reg,
        d: A32Reg,
        rotate: u32,
        imm8: u32,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let c = self.ir.get_c_flag();
        let result = self.ir.sub_with_carry(b, a, c);
        self.arith_result(s, d, result)
    }

    // -- Compare / test (always set flags, no destination) --

    pub fn arm_tst_reg(
        &mut self,
        cond: Cond,
        n: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.and_32(a, operand.0);
        self.set_flags_logical(result, operand.1);
        true
    }

    pub fn arm_teq_reg(
        &mut self,
        cond: Cond,
        n: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.eor_32(a, operand.0);
        self.set_flags_logical(result, operand.1);
        true
    }

    pub fn arm_cmp_reg(
        &mut self,
        cond: Cond,
        n: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.sub(a, operand);
        self.set_flags_nzcv(result);
        true
    }

    pub fn arm_cmn_reg(
        &mut self,
        cond: Cond,
        n: A32Reg,
        imm5: u32,
        stype: ShiftType,
        m: A32Reg,
    ) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let (operand, _) = self.shifter_reg(m, stype, imm5);
        let a = self.reg(n);
        let result = self.ir.add(a, operand);
        self.set_flags_nzcv(result);
        true
    }

    pub fn arm_tst_imm(&mut self, cond: Cond, n: A32Reg, rotate: u32, imm8: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        let a = self.reg(n);
        let result = self.ir.and_32(a, operand.0);
        self.set_flags_logical(result, operand.1);
        true
    }

    pub fn arm_teq_imm(&mut self, cond: Cond, n: A32Reg, rotate: u32, imm8: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let operand = self.shifter_imm(rotate, imm8);
        let a = self.reg(n);
        let result = self.ir.eor_32(a, operand.0);
        self.set_flags_logical(result, operand.1);
        true
    }

    pub fn arm_cmp_imm(&mut self, cond: Cond, n: A32Reg, rotate: u32, imm8: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let result = self.ir.sub(a, b);
        self.set_flags_nzcv(result);
        true
    }

    pub fn arm_cmn_imm(&mut self, cond: Cond, n: A32Reg, rotate: u32, imm8: u32) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        let imm32 = self.expand_imm(rotate, imm8);
        let a = self.reg(n);
        let b = self.ir.imm32(imm32);
        let result = self.ir.add(a, b);
        self.set_flags_nzcv(result);
        true
    }

    // -- Multiply / divide --

    pub fn arm_mul(&mut self, cond: Cond, s: bool, d: A32Reg, sr: A32Reg, m: A32Reg) -> bool {
        if d == A32Reg::PC || sr == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let a = self.reg(m);
        let b = self.reg(sr);
        let result = self.ir.mul(a, b);
        self.ir.set_register(d, result);
        if s {
            let n = self.ir.most_significant_bit(result);
            self.ir.set_n_flag(n);
            let z = self.ir.is_zero_32(result);
            self.ir.set_z_flag(z);
        }
        true
    }

    pub fn arm_mla(
        &mut self,
        cond: Cond,
        s: bool,
        d: A32Reg,
        a: A32Reg,
        sr: A32Reg,
        m: A32Reg,
    ) -> bool {
        if d == A32Reg::PC || a == A32Reg::PC || sr == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let x = self.reg(m);
        let y = self.reg(sr);
        let product = self.ir.mul(x, y);
        let acc = self.reg(a);
        let result = self.ir.add(product, acc);
        self.ir.set_register(d, result);
        if s {
            let n = self.ir.most_significant_bit(result);
            self.ir.set_n_flag(n);
            let z = self.ir.is_zero_32(result);
            self.ir.set_z_flag(z);
        }
        true
    }

    pub fn arm_sdiv(&mut self, cond: Cond, d: A32Reg, m: A32Reg, n: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC || n == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let a = self.reg(n);
        let b = self.reg(m);
        let result = self.ir.signed_div(a, b);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_udiv(&mut self, cond: Cond, d: A32Reg, m: A32Reg, n: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC || n == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let a = self.reg(n);
        let b = self.reg(m);
        let result = self.ir.unsigned_div(a, b);
        self.ir.set_register(d, result);
        true
    }

    // -- CLZ / extension / byte reversal --

    pub fn arm_clz(&mut self, cond: Cond, d: A32Reg, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let a = self.reg(m);
        let result = self.ir.count_leading_zeros(a);
        self.ir.set_register(d, result);
        true
    }

    fn rotated_operand(&mut self, m: A32Reg, rotate: u32) -> Value {
        let value = self.reg(m);
        if rotate == 0 {
            value
        } else {
            let n = self.ir.imm8((8 * rotate) as u8);
            let zero = self.ir.imm1(false);
            self.ir.rotate_right(value, n, zero).result
        }
    }

    pub fn arm_sxtb(&mut self, cond: Cond, d: A32Reg, rotate: u32, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let rotated = self.rotated_operand(m, rotate);
        let byte = self.ir.least_significant_byte(rotated);
        let result = self.ir.sign_extend_byte_to_word(byte);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_sxth(&mut self, cond: Cond, d: A32Reg, rotate: u32, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let rotated = self.rotated_operand(m, rotate);
        let half = self.ir.least_significant_half(rotated);
        let result = self.ir.sign_extend_half_to_word(half);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_uxtb(&mut self, cond: Cond, d: A32Reg, rotate: u32, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let rotated = self.rotated_operand(m, rotate);
        let byte = self.ir.least_significant_byte(rotated);
        let result = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_uxth(&mut self, cond: Cond, d: A32Reg, rotate: u32, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let rotated = self.rotated_operand(m, rotate);
        let half = self.ir.least_significant_half(rotated);
        let result = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_rev(&mut self, cond: Cond, d: A32Reg, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        let a = self.reg(m);
        let result = self.ir.byte_reverse_word(a);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_rev16(&mut self, cond: Cond, d: A32Reg, m: A32Reg) -> bool {
        if d == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        if !self.condition_passed(cond) {
            return true;
        }
        // Swap the bytes of each halfword independently.
        let x = self.reg(m);
        let hi_mask = self.ir.imm32(0xFF00_FF00);
        let hi = self.ir.and_32(x, hi_mask);
        let eight = self.ir.imm8(8);
        let zero = self.ir.imm1(false);
        let hi = self.ir.logical_shift_right(hi, eight, zero).result;
        let lo_mask = self.ir.imm32(0x00FF_00FF);
        let lo = self.ir.and_32(x, lo_mask);
        let eight = self.ir.imm8(8);
        let zero = self.ir.imm1(false);
        let lo = self.ir.logical_shift_left(lo, eight, zero).result;
        let result = self.ir.or_32(hi, lo);
        self.ir.set_register(d, result);
        true
    }

    pub fn arm_nop(&mut self, cond: Cond) -> bool {
        if !self.condition_passed(cond) {
            return true;
        }
        true
    }
}
