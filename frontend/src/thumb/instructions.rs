//! Thumb-16 instruction semantics.

use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, Exception};

use super::ThumbTranslatorVisitor;

impl ThumbTranslatorVisitor {
    // -- Shift (immediate) --

    pub fn thumb16_lsl_imm(&mut self, imm5: u32, m: A32Reg, d: A32Reg) -> bool {
        let carry_in = self.ir.get_c_flag();
        let value = self.reg(m);
        let shift = self.ir.imm8(imm5 as u8);
        let shifted = self.ir.logical_shift_left(value, shift, carry_in);
        self.ir.set_register(d, shifted.result);
        self.ir.set_nzc_from_result(shifted.result, shifted.carry);
        true
    }

    pub fn thumb16_lsr_imm(&mut self, imm5: u32, m: A32Reg, d: A32Reg) -> bool {
        let carry_in = self.ir.get_c_flag();
        let value = self.reg(m);
        let shift = self.ir.imm8(if imm5 == 0 { 32 } else { imm5 as u8 });
        let shifted = self.ir.logical_shift_right(value, shift, carry_in);
        self.ir.set_register(d, shifted.result);
        self.ir.set_nzc_from_result(shifted.result, shifted.carry);
        true
    }

    pub fn thumb16_asr_imm(&mut self, imm5: u32, m: A32Reg, d: A32Reg) -> bool {
        let carry_in = self.ir.get_c_flag();
        let value = self.reg(m);
        let shift = self.ir.imm8(if imm5 == 0 { 32 } else { imm5 as u8 });
        let shifted = self.ir.arithmetic_shift_right(value, shift, carry_in);
        self.ir.set_register(d, shifted.result);
        self.ir.set_nzc_from_result(shifted.result, shifted.carry);
        true
    }

    // -- Add/subtract (three registers / three-bit immediate) --

    pub fn thumb16_add_reg_t1(&mut self, m: A32Reg, n: A32Reg, d: A32Reg) -> bool {
        let a = self.reg(n);
        let b = self.reg(m);
        let result = self.ir.add(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_sub_reg(&mut self, m: A32Reg, n: A32Reg, d: A32Reg) -> bool {
        let a = self.reg(n);
        let b = self.reg(m);
        let result = self.ir.sub(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_add_imm3(&mut self, imm3: u32, n: A32Reg, d: A32Reg) -> bool {
        let a = self.reg(n);
        let b = self.ir.imm32(imm3);
        let result = self.ir.add(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_sub_imm3(&mut self, imm3: u32, n: A32Reg, d: A32Reg) -> bool {
        let a = self.reg(n);
        let b = self.ir.imm32(imm3);
        let result = self.ir.sub(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    // -- Move/compare/add/subtract (eight-bit immediate) --

    pub fn thumb16_mov_imm(&mut self, d: A32Reg, imm8: u32) -> bool {
        let value = self.ir.imm32(imm8);
        self.ir.set_register(d, value);
        self.set_flags_nz(value);
        true
    }

    pub fn thumb16_cmp_imm(&mut self, n: A32Reg, imm8: u32) -> bool {
        let a = self.reg(n);
        let b = self.ir.imm32(imm8);
        let result = self.ir.sub(a, b);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_add_imm8(&mut self, d: A32Reg, imm8: u32) -> bool {
        let a = self.reg(d);
        let b = self.ir.imm32(imm8);
        let result = self.ir.add(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_sub_imm8(&mut self, d: A32Reg, imm8: u32) -> bool {
        let a = self.reg(d);
        let b = self.ir.imm32(imm8);
        let result = self.ir.sub(a, b);
        self.ir.set_register(d, result);
        self.set_flags_nzcv(result);
        true
    }

    // -- Data processing (register) --

    pub fn thumb16_data_processing(&mut self, op: u32, m: A32Reg, d: A32Reg) -> bool {
        match op {
            0b0000 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.and_32(a, b);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
            0b0001 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.eor_32(a, b);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
            0b0010 | 0b0011 | 0b0100 | 0b0111 => {
                // Shift by register: amount is the low byte of Rm.
                let carry_in = self.ir.get_c_flag();
                let value = self.reg(d);
                let amount_word = self.reg(m);
                let amount = self.ir.least_significant_byte(amount_word);
                let shifted = match op {
                    0b0010 => self.ir.logical_shift_left(value, amount, carry_in),
                    0b0011 => self.ir.logical_shift_right(value, amount, carry_in),
                    0b0100 => self.ir.arithmetic_shift_right(value, amount, carry_in),
                    _ => self.ir.rotate_right(value, amount, carry_in),
                };
                self.ir.set_register(d, shifted.result);
                self.ir.set_nzc_from_result(shifted.result, shifted.carry);
            }
            0b0101 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let c = self.ir.get_c_flag();
                let result = self.ir.add_with_carry(a, b, c);
                self.ir.set_register(d, result);
                self.set_flags_nzcv(result);
            }
            0b0110 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let c = self.ir.get_c_flag();
                let result = self.ir.sub_with_carry(a, b, c);
                self.ir.set_register(d, result);
                self.set_flags_nzcv(result);
            }
            0b1000 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.and_32(a, b);
                self.set_flags_nz(result);
            }
            0b1001 => {
                let zero = self.ir.imm32(0);
                let b = self.reg(m);
                let result = self.ir.sub(zero, b);
                self.ir.set_register(d, result);
                self.set_flags_nzcv(result);
            }
            0b1010 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.sub(a, b);
                self.set_flags_nzcv(result);
            }
            0b1011 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.add(a, b);
                self.set_flags_nzcv(result);
            }
            0b1100 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.or_32(a, b);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
            0b1101 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let result = self.ir.mul(a, b);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
            0b1110 => {
                let a = self.reg(d);
                let b = self.reg(m);
                let inverted = self.ir.not_32(b);
                let result = self.ir.and_32(a, inverted);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
            _ => {
                let b = self.reg(m);
                let result = self.ir.not_32(b);
                self.ir.set_register(d, result);
                self.set_flags_nz(result);
            }
        }
        true
    }

    // -- Hi-register operations --

    pub fn thumb16_add_hi(&mut self, d: A32Reg, m: A32Reg) -> bool {
        if d == A32Reg::PC {
            let a = self.reg(d);
            let b = self.reg(m);
            let result = self.ir.add(a, b);
            let aligned = self.ir.imm32(!1);
            let pc = self.ir.and_32(result, aligned);
            self.ir.set_register(A32Reg::PC, pc);
            self.ir.set_term(Terminal::ReturnToDispatch);
            return false;
        }
        let a = self.reg(d);
        let b = self.reg(m);
        let result = self.ir.add(a, b);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_cmp_hi(&mut self, n: A32Reg, m: A32Reg) -> bool {
        if n == A32Reg::PC || m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let a = self.reg(n);
        let b = self.reg(m);
        let result = self.ir.sub(a, b);
        self.set_flags_nzcv(result);
        true
    }

    pub fn thumb16_mov_hi(&mut self, d: A32Reg, m: A32Reg) -> bool {
        let value = self.reg(m);
        if d == A32Reg::PC {
            let aligned = self.ir.imm32(!1);
            let pc = self.ir.and_32(value, aligned);
            self.ir.set_register(A32Reg::PC, pc);
            self.ir.set_term(Terminal::ReturnToDispatch);
            return false;
        }
        self.ir.set_register(d, value);
        true
    }

    pub fn thumb16_bx(&mut self, m: A32Reg) -> bool {
        let target = self.reg(m);
        self.bx_write_pc(target);
        self.ir.set_term(Terminal::PopRSBHint);
        false
    }

    pub fn thumb16_blx_reg(&mut self, m: A32Reg) -> bool {
        if m == A32Reg::PC {
            return self.unpredictable_instruction();
        }
        let return_location = self.ir.current_location.advance_pc(2);
        self.ir.push_rsb(return_location);
        let lr = self.ir.imm32(return_location.pc() as u32 | 1);
        self.ir.set_register(A32Reg::LR, lr);
        let target = self.reg(m);
        self.bx_write_pc(target);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    // -- Load/store --

    pub fn thumb16_ldr_literal(&mut self, t: A32Reg, imm8: u32) -> bool {
        let pc = self.ir.current_location.pc() as u32;
        let base = (pc.wrapping_add(4)) & !3;
        let address = self.ir.imm32(base.wrapping_add(imm8 * 4));
        let data = self.read_memory_32(address);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_ldr_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let data = self.read_memory_32(address);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_str_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        self.write_memory_32(address, value);
        true
    }

    pub fn thumb16_ldrb_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let byte = self.ir.read_memory_8(address);
        let data = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_strb_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        let byte = self.ir.least_significant_byte(value);
        self.ir.write_memory_8(address, byte);
        true
    }

    pub fn thumb16_ldrh_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_strh_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        let half = self.ir.least_significant_half(value);
        self.write_memory_16(address, half);
        true
    }

    pub fn thumb16_ldrsb_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let byte = self.ir.read_memory_8(address);
        let data = self.ir.sign_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_ldrsh_reg(&mut self, m: A32Reg, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.reg(m);
        let address = self.ir.add(base, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.sign_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_ldr_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5 * 4);
        let address = self.ir.add(base, offset);
        let data = self.read_memory_32(address);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_str_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5 * 4);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        self.write_memory_32(address, value);
        true
    }

    pub fn thumb16_ldrb_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5);
        let address = self.ir.add(base, offset);
        let byte = self.ir.read_memory_8(address);
        let data = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_strb_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        let byte = self.ir.least_significant_byte(value);
        self.ir.write_memory_8(address, byte);
        true
    }

    pub fn thumb16_ldrh_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5 * 2);
        let address = self.ir.add(base, offset);
        let half = self.read_memory_16(address);
        let data = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(t, data);
        true
    }

    pub fn thumb16_strh_imm(&mut self, imm5: u32, n: A32Reg, t: A32Reg) -> bool {
        let base = self.reg(n);
        let offset = self.ir.imm32(imm5 * 2);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        let half = self.ir.least_significant_half(value);
        self.write_memory_16(address, half);
        true
    }

    pub fn thumb16_str_sp(&mut self, t: A32Reg, imm8: u32) -> bool {
        let base = self.reg(A32Reg::SP);
        let offset = self.ir.imm32(imm8 * 4);
        let address = self.ir.add(base, offset);
        let value = self.reg(t);
        self.write_memory_32(address, value);
        true
    }

    pub fn thumb16_ldr_sp(&mut self, t: A32Reg, imm8: u32) -> bool {
        let base = self.reg(A32Reg::SP);
        let offset = self.ir.imm32(imm8 * 4);
        let address = self.ir.add(base, offset);
        let data = self.read_memory_32(address);
        self.ir.set_register(t, data);
        true
    }

    // -- Address generation / SP adjustment --

    pub fn thumb16_adr(&mut self, d: A32Reg, imm8: u32) -> bool {
        let pc = self.ir.current_location.pc() as u32;
        let value = self.ir.imm32(((pc.wrapping_add(4)) & !3).wrapping_add(imm8 * 4));
        self.ir.set_register(d, value);
        true
    }

    pub fn thumb16_add_sp_imm8(&mut self, d: A32Reg, imm8: u32) -> bool {
        let sp = self.reg(A32Reg::SP);
        let offset = self.ir.imm32(imm8 * 4);
        let result = self.ir.add(sp, offset);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_add_sp_imm7(&mut self, imm7: u32) -> bool {
        let sp = self.reg(A32Reg::SP);
        let offset = self.ir.imm32(imm7 * 4);
        let result = self.ir.add(sp, offset);
        self.ir.set_register(A32Reg::SP, result);
        true
    }

    pub fn thumb16_sub_sp_imm7(&mut self, imm7: u32) -> bool {
        let sp = self.reg(A32Reg::SP);
        let offset = self.ir.imm32(imm7 * 4);
        let result = self.ir.sub(sp, offset);
        self.ir.set_register(A32Reg::SP, result);
        true
    }

    // -- Extension / byte reversal --

    pub fn thumb16_sxth(&mut self, m: A32Reg, d: A32Reg) -> bool {
        let value = self.reg(m);
        let half = self.ir.least_significant_half(value);
        let result = self.ir.sign_extend_half_to_word(half);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_sxtb(&mut self, m: A32Reg, d: A32Reg) -> bool {
        let value = self.reg(m);
        let byte = self.ir.least_significant_byte(value);
        let result = self.ir.sign_extend_byte_to_word(byte);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_uxth(&mut self, m: A32Reg, d: A32Reg) -> bool {
        let value = self.reg(m);
        let half = self.ir.least_significant_half(value);
        let result = self.ir.zero_extend_half_to_word(half);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_uxtb(&mut self, m: A32Reg, d: A32Reg) -> bool {
        let value = self.reg(m);
        let byte = self.ir.least_significant_byte(value);
        let result = self.ir.zero_extend_byte_to_word(byte);
        self.ir.set_register(d, result);
        true
    }

    pub fn thumb16_rev(&mut self, m: A32Reg, d: A32Reg) -> bool {
        let value = self.reg(m);
        let result = self.ir.byte_reverse_word(value);
        self.ir.set_register(d, result);
        true
    }

    // -- Push/pop and load/store multiple --

    pub fn thumb16_push(&mut self, lr: bool, list: u32) -> bool {
        let list = list | if lr { 1 << 14 } else { 0 };
        if list == 0 {
            return self.unpredictable_instruction();
        }
        let count = list.count_ones();
        let sp = self.reg(A32Reg::SP);
        let size = self.ir.imm32(4 * count);
        let start = self.ir.sub(sp, size);
        self.ir.set_register(A32Reg::SP, start);
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
        true
    }

    pub fn thumb16_pop(&mut self, pc: bool, list: u32) -> bool {
        let list = list | if pc { 1 << 15 } else { 0 };
        if list == 0 {
            return self.unpredictable_instruction();
        }
        let count = list.count_ones();
        let sp = self.reg(A32Reg::SP);
        let mut address = sp;
        let size = self.ir.imm32(4 * count);
        let new_sp = self.ir.add(sp, size);
        self.ir.set_register(A32Reg::SP, new_sp);
        for i in 0..15 {
            if list & (1 << i) == 0 {
                continue;
            }
            let data = self.read_memory_32(address);
            self.ir.set_register(A32Reg::from_bits(i), data);
            let four = self.ir.imm32(4);
            address = self.ir.add(address, four);
        }
        if pc {
            let data = self.read_memory_32(address);
            self.bx_write_pc(data);
            self.ir.set_term(Terminal::PopRSBHint);
            return false;
        }
        true
    }

    pub fn thumb16_stm(&mut self, n: A32Reg, list: u32) -> bool {
        if list == 0 {
            return self.unpredictable_instruction();
        }
        let count = list.count_ones();
        let base = self.reg(n);
        let mut address = base;
        for i in 0..8 {
            if list & (1 << i) == 0 {
                continue;
            }
            let value = self.reg(A32Reg::from_bits(i));
            self.write_memory_32(address, value);
            let four = self.ir.imm32(4);
            address = self.ir.add(address, four);
        }
        let size = self.ir.imm32(4 * count);
        let new_base = self.ir.add(base, size);
        self.ir.set_register(n, new_base);
        true
    }

    pub fn thumb16_ldm(&mut self, n: A32Reg, list: u32) -> bool {
        if list == 0 {
            return self.unpredictable_instruction();
        }
        let count = list.count_ones();
        let writeback = list & (1 << n.index()) == 0;
        let base = self.reg(n);
        if writeback {
            let size = self.ir.imm32(4 * count);
            let new_base = self.ir.add(base, size);
            self.ir.set_register(n, new_base);
        }
        let mut address = base;
        for i in 0..8 {
            if list & (1 << i) == 0 {
                continue;
            }
            let data = self.read_memory_32(address);
            self.ir.set_register(A32Reg::from_bits(i), data);
            let four = self.ir.imm32(4);
            address = self.ir.add(address, four);
        }
        true
    }

    // -- Branches / exceptions --

    pub fn thumb16_b_cond(&mut self, cond_bits: u32, imm8: u32) -> bool {
        let Some(cond) = super::cond_from_thumb(cond_bits) else {
            return self.undefined_instruction();
        };
        let offset = ((imm8 << 24) as i32 >> 24) * 2 + 4;
        let then_location = self.ir.current_location.advance_pc(offset as i64 as u64);
        let else_location = self.ir.current_location.advance_pc(2);
        self.ir.set_term(Terminal::If {
            cond,
            then_: Box::new(Terminal::LinkBlock(then_location)),
            else_: Box::new(Terminal::LinkBlock(else_location)),
        });
        false
    }

    pub fn thumb16_b(&mut self, imm11: u32) -> bool {
        let offset = ((imm11 << 21) as i32 >> 21) * 2 + 4;
        let target = self.ir.current_location.advance_pc(offset as i64 as u64);
        self.ir.set_term(Terminal::LinkBlockFast(target));
        false
    }

    pub fn thumb16_svc(&mut self, imm8: u32) -> bool {
        let next = self.ir.current_location.advance_pc(2);
        let pc = self.ir.imm32(next.pc() as u32);
        self.ir.set_register(A32Reg::PC, pc);
        let swi = self.ir.imm32(imm8);
        self.ir.call_supervisor(swi);
        self.ir
            .set_term(Terminal::CheckHalt(Box::new(Terminal::LinkBlock(next))));
        false
    }

    pub fn thumb16_bkpt(&mut self, _imm8: u32) -> bool {
        self.raise_exception(Exception::Breakpoint)
    }

    pub fn thumb16_udf(&mut self) -> bool {
        self.undefined_instruction()
    }

    pub fn thumb16_nop(&mut self) -> bool {
        true
    }
}
