//! A64 instruction semantics.

use dbt_ir::block::Terminal;
use dbt_ir::{A64Reg, Cond, Value};

use super::A64TranslatorVisitor;

/// Shift applied to the second operand of the shifted-register forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A64Shift {
    LSL,
    LSR,
    ASR,
}

impl A64Shift {
    pub fn from_bits(bits: u32) -> Option<A64Shift> {
        match bits & 3 {
            0 => Some(A64Shift::LSL),
            1 => Some(A64Shift::LSR),
            2 => Some(A64Shift::ASR),
            _ => None,
        }
    }
}

impl A64TranslatorVisitor {
    fn shifted_operand(&mut self, sf: bool, m: u32, shift: A64Shift, amount: u32) -> Value {
        let value = self.operand(sf, m);
        if amount == 0 {
            return value;
        }
        let n = self.ir.imm8(amount as u8);
        if sf {
            match shift {
                A64Shift::LSL => self.ir.logical_shift_left_64(value, n),
                A64Shift::LSR => self.ir.logical_shift_right_64(value, n),
                A64Shift::ASR => self.ir.arithmetic_shift_right_64(value, n),
            }
        } else {
            let zero = self.ir.imm1(false);
            match shift {
                A64Shift::LSL => self.ir.logical_shift_left(value, n, zero).result,
                A64Shift::LSR => self.ir.logical_shift_right(value, n, zero).result,
                A64Shift::ASR => self.ir.arithmetic_shift_right(value, n, zero).result,
            }
        }
    }

    fn add_sub(&mut self, sf: bool, sub: bool, a: Value, b: Value) -> Value {
        match (sf, sub) {
            (true, false) => self.ir.add64(a, b),
            (true, true) => self.ir.sub64(a, b),
            (false, false) => self.ir.add(a, b),
            (false, true) => self.ir.sub(a, b),
        }
    }

    fn set_nzcv_from(&mut self, result: Value) {
        let nzcv = self.ir.nzcv_from(result);
        self.ir.set_cpsr_nzcv(nzcv);
    }

    // -- Add/subtract (immediate); Rn/Rd are SP when 31 --

    pub fn a64_add_sub_imm(
        &mut self,
        sf: bool,
        sub: bool,
        s: bool,
        shift12: bool,
        imm12: u32,
        n: u32,
        d: u32,
    ) -> bool {
        let imm = u64::from(imm12) << if shift12 { 12 } else { 0 };
        let a = self.x_or_sp(n);
        let a = if sf {
            a
        } else {
            self.ir.least_significant_word(a)
        };
        let b = if sf {
            self.ir.imm64(imm)
        } else {
            self.ir.imm32(imm as u32)
        };
        let result = self.add_sub(sf, sub, a, b);
        if s {
            self.set_nzcv_from(result);
            self.set_result(sf, d, result);
        } else if d == 31 {
            // Without flags, Rd = 31 targets SP.
            let wide = if sf {
                result
            } else {
                self.ir.zero_extend_word_to_long(result)
            };
            self.set_x_or_sp(d, wide);
        } else {
            self.set_result(sf, d, result);
        }
        true
    }

    // -- Add/subtract (shifted register) --

    #[allow(clippy::too_many_arguments)]
    pub fn a64_add_sub_shifted(
        &mut self,
        sf: bool,
        sub: bool,
        s: bool,
        shift: Option<A64Shift>,
        m: u32,
        imm6: u32,
        n: u32,
        d: u32,
    ) -> bool {
        let Some(shift) = shift else {
            return self.undefined_instruction();
        };
        if !sf && imm6 >= 32 {
            return self.undefined_instruction();
        }
        let b = self.shifted_operand(sf, m, shift, imm6);
        let a = self.operand(sf, n);
        let result = self.add_sub(sf, sub, a, b);
        if s {
            self.set_nzcv_from(result);
        }
        self.set_result(sf, d, result);
        true
    }

    // -- Logical (shifted register) --

    #[allow(clippy::too_many_arguments)]
    pub fn a64_logical_shifted(
        &mut self,
        sf: bool,
        opc: u32,
        shift: Option<A64Shift>,
        m: u32,
        imm6: u32,
        n: u32,
        d: u32,
    ) -> bool {
        let Some(shift) = shift else {
            return self.undefined_instruction();
        };
        if !sf && imm6 >= 32 {
            return self.undefined_instruction();
        }
        let b = self.shifted_operand(sf, m, shift, imm6);
        let a = self.operand(sf, n);
        let result = match opc {
            0b00 | 0b11 => {
                if sf {
                    self.ir.and_64(a, b)
                } else {
                    self.ir.and_32(a, b)
                }
            }
            0b01 => {
                if sf {
                    self.ir.or_64(a, b)
                } else {
                    self.ir.or_32(a, b)
                }
            }
            _ => {
                if sf {
                    self.ir.eor_64(a, b)
                } else {
                    self.ir.eor_32(a, b)
                }
            }
        };
        if opc == 0b11 {
            // ANDS: N and Z from the result, C and V cleared.
            let n_flag = self.ir.most_significant_bit(result);
            self.ir.set_n_flag(n_flag);
            let z = if sf {
                self.ir.is_zero_64(result)
            } else {
                self.ir.is_zero_32(result)
            };
            self.ir.set_z_flag(z);
            let zero = self.ir.imm1(false);
            self.ir.set_c_flag(zero);
            let zero = self.ir.imm1(false);
            self.ir.set_v_flag(zero);
        }
        self.set_result(sf, d, result);
        true
    }

    // -- Move wide --

    pub fn a64_movz(&mut self, sf: bool, hw: u32, imm16: u32, d: u32) -> bool {
        if !sf && hw >= 2 {
            return self.undefined_instruction();
        }
        let value = u64::from(imm16) << (16 * hw);
        let imm = if sf {
            self.ir.imm64(value)
        } else {
            self.ir.imm32(value as u32)
        };
        self.set_result(sf, d, imm);
        true
    }

    pub fn a64_movn(&mut self, sf: bool, hw: u32, imm16: u32, d: u32) -> bool {
        if !sf && hw >= 2 {
            return self.undefined_instruction();
        }
        let value = !(u64::from(imm16) << (16 * hw));
        let imm = if sf {
            self.ir.imm64(value)
        } else {
            self.ir.imm32(value as u32)
        };
        self.set_result(sf, d, imm);
        true
    }

    pub fn a64_movk(&mut self, sf: bool, hw: u32, imm16: u32, d: u32) -> bool {
        if !sf && hw >= 2 {
            return self.undefined_instruction();
        }
        let shift = 16 * hw;
        let old = self.operand(sf, d);
        if sf {
            let mask = self.ir.imm64(!(0xFFFFu64 << shift));
            let cleared = self.ir.and_64(old, mask);
            let piece = self.ir.imm64(u64::from(imm16) << shift);
            let result = self.ir.or_64(cleared, piece);
            self.set_result(sf, d, result);
        } else {
            let mask = self.ir.imm32(!(0xFFFFu32 << shift));
            let cleared = self.ir.and_32(old, mask);
            let piece = self.ir.imm32(imm16 << shift);
            let result = self.ir.or_32(cleared, piece);
            self.set_result(sf, d, result);
        }
        true
    }

    // -- PC-relative address generation --

    pub fn a64_adr(&mut self, immlo: u32, immhi: u32, d: u32) -> bool {
        let raw = (immhi << 2) | immlo;
        let offset = ((raw << 11) as i32 >> 11) as i64;
        let pc = self.ir.current_location.pc();
        let value = self.ir.imm64(pc.wrapping_add(offset as u64));
        self.set_result(true, d, value);
        true
    }

    pub fn a64_adrp(&mut self, immlo: u32, immhi: u32, d: u32) -> bool {
        let raw = (immhi << 2) | immlo;
        let offset = (((raw << 11) as i32 >> 11) as i64) << 12;
        let pc = self.ir.current_location.pc() & !0xFFF;
        let value = self.ir.imm64(pc.wrapping_add(offset as u64));
        self.set_result(true, d, value);
        true
    }

    // -- Conditional select --

    pub fn a64_csel(&mut self, sf: bool, m: u32, cond: Cond, n: u32, d: u32) -> bool {
        let a = self.operand(sf, n);
        let b = self.operand(sf, m);
        let result = if sf {
            self.ir.conditional_select_64(cond, a, b)
        } else {
            self.ir.conditional_select_32(cond, a, b)
        };
        self.set_result(sf, d, result);
        true
    }

    // -- Load/store (unsigned immediate offset) --

    pub fn a64_ldr_str_imm(&mut self, size: u32, load: bool, imm12: u32, n: u32, t: u32) -> bool {
        let base = self.x_or_sp(n);
        let offset = self.ir.imm64(u64::from(imm12) << size);
        let address = self.ir.add64(base, offset);
        if load {
            match size {
                0 => {
                    let byte = self.ir.read_memory_8(address);
                    let data = self.ir.zero_extend_byte_to_word(byte);
                    self.set_result(false, t, data);
                }
                1 => {
                    let half = self.ir.read_memory_16(address);
                    let data = self.ir.zero_extend_half_to_word(half);
                    self.set_result(false, t, data);
                }
                2 => {
                    let data = self.ir.read_memory_32(address);
                    self.set_result(false, t, data);
                }
                _ => {
                    let data = self.ir.read_memory_64(address);
                    self.set_result(true, t, data);
                }
            }
        } else {
            match size {
                0 => {
                    let value = self.w_or_zero(t);
                    let byte = self.ir.least_significant_byte(value);
                    self.ir.write_memory_8(address, byte);
                }
                1 => {
                    let value = self.w_or_zero(t);
                    let half = self.ir.least_significant_half(value);
                    self.ir.write_memory_16(address, half);
                }
                2 => {
                    let value = self.w_or_zero(t);
                    self.ir.write_memory_32(address, value);
                }
                _ => {
                    let value = self.x_or_zero(t);
                    self.ir.write_memory_64(address, value);
                }
            }
        }
        true
    }

    // -- Branches --

    pub fn a64_b(&mut self, imm26: u32) -> bool {
        let offset = (((imm26 << 6) as i32 >> 6) as i64) * 4;
        let target = self.ir.current_location.advance_pc(offset as u64);
        self.ir.set_term(Terminal::LinkBlockFast(target));
        false
    }

    pub fn a64_bl(&mut self, imm26: u32) -> bool {
        let return_location = self.ir.current_location.advance_pc(4);
        self.ir.push_rsb(return_location);
        let lr = self.ir.imm64(return_location.pc());
        self.ir.a64_set_x(A64Reg::from_bits(30), lr);
        let offset = (((imm26 << 6) as i32 >> 6) as i64) * 4;
        let target = self.ir.current_location.advance_pc(offset as u64);
        self.ir.set_term(Terminal::LinkBlock(target));
        false
    }

    pub fn a64_b_cond(&mut self, imm19: u32, cond: Cond) -> bool {
        let offset = (((imm19 << 13) as i32 >> 13) as i64) * 4;
        let then_location = self.ir.current_location.advance_pc(offset as u64);
        let else_location = self.ir.current_location.advance_pc(4);
        self.ir.set_term(Terminal::If {
            cond,
            then_: Box::new(Terminal::LinkBlock(then_location)),
            else_: Box::new(Terminal::LinkBlock(else_location)),
        });
        false
    }

    pub fn a64_cbz_cbnz(&mut self, sf: bool, nonzero: bool, imm19: u32, t: u32) -> bool {
        let value = self.operand(sf, t);
        let is_zero = if sf {
            self.ir.is_zero_64(value)
        } else {
            self.ir.is_zero_32(value)
        };
        self.ir.set_check_bit(is_zero);
        let offset = (((imm19 << 13) as i32 >> 13) as i64) * 4;
        let target = self.ir.current_location.advance_pc(offset as u64);
        let next = self.ir.current_location.advance_pc(4);
        let (then_, else_) = if nonzero {
            // Bit set means the value was zero: fall through.
            (Terminal::LinkBlock(next), Terminal::LinkBlock(target))
        } else {
            (Terminal::LinkBlock(target), Terminal::LinkBlock(next))
        };
        self.ir.set_term(Terminal::CheckBit {
            then_: Box::new(then_),
            else_: Box::new(else_),
        });
        false
    }

    pub fn a64_br(&mut self, n: u32) -> bool {
        let target = self.x_or_zero(n);
        self.ir.a64_set_pc(target);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub fn a64_blr(&mut self, n: u32) -> bool {
        let return_location = self.ir.current_location.advance_pc(4);
        self.ir.push_rsb(return_location);
        let target = self.x_or_zero(n);
        let lr = self.ir.imm64(return_location.pc());
        self.ir.a64_set_x(A64Reg::from_bits(30), lr);
        self.ir.a64_set_pc(target);
        self.ir.set_term(Terminal::ReturnToDispatch);
        false
    }

    pub fn a64_ret(&mut self, n: u32) -> bool {
        let target = self.x_or_zero(n);
        self.ir.a64_set_pc(target);
        self.ir.set_term(Terminal::PopRSBHint);
        false
    }

    // -- Exception generation / hints --

    pub fn a64_svc(&mut self, imm16: u32) -> bool {
        let next = self.ir.current_location.advance_pc(4);
        let pc = self.ir.imm64(next.pc());
        self.ir.a64_set_pc(pc);
        let swi = self.ir.imm32(imm16);
        self.ir.call_supervisor(swi);
        self.ir
            .set_term(Terminal::CheckHalt(Box::new(Terminal::LinkBlock(next))));
        false
    }

    pub fn a64_brk(&mut self, _imm16: u32) -> bool {
        self.raise_exception(dbt_ir::Exception::Breakpoint)
    }

    pub fn a64_nop(&mut self) -> bool {
        true
    }
}
