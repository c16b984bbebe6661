//! Thumb frontend (16-bit encodings plus the 32-bit BL/BLX pair).
//!
//! Thumb-16 has no condition field outside branches, so there is no
//! conditional-state machine here; conditional branches lower to the
//! `If` terminal instead. A halfword whose top five bits are `11101`,
//! `11110` or `11111` begins a 32-bit encoding; only BL/BLX immediate
//! are translated from that space.

pub mod decode;
mod instructions;

use dbt_ir::block::Terminal;
use dbt_ir::{A32Reg, Block, Cond, Exception, IrEmitter, LocationDescriptor, Value};

use crate::{TranslateCallbacks, TranslationOptions};

use super::a32::MAX_INSTRUCTIONS_PER_BLOCK;

pub struct ThumbTranslatorVisitor {
    pub ir: IrEmitter,
}

impl ThumbTranslatorVisitor {
    pub fn new(descriptor: LocationDescriptor) -> Self {
        ThumbTranslatorVisitor {
            ir: IrEmitter::new(descriptor),
        }
    }

    /// Read a register; R15 reads as the current instruction address
    /// plus 4 (Thumb-state prefetch offset).
    pub fn reg(&mut self, r: A32Reg) -> Value {
        if r == A32Reg::PC {
            let pc = self.ir.current_location.pc() as u32;
            self.ir.imm32(pc.wrapping_add(4))
        } else {
            self.ir.get_register(r)
        }
    }

    /// N and Z from the result; C and V untouched.
    pub fn set_flags_nz(&mut self, result: Value) {
        let n = self.ir.most_significant_bit(result);
        self.ir.set_n_flag(n);
        let z = self.ir.is_zero_32(result);
        self.ir.set_z_flag(z);
    }

    pub fn set_flags_nzcv(&mut self, result: Value) {
        let n = self.ir.most_significant_bit(result);
        self.ir.set_n_flag(n);
        let z = self.ir.is_zero_32(result);
        self.ir.set_z_flag(z);
        let c = self.ir.carry_from(result);
        self.ir.set_c_flag(c);
        let v = self.ir.overflow_from(result);
        self.ir.set_v_flag(v);
    }

    pub fn bx_write_pc(&mut self, value: Value) {
        let one = self.ir.imm32(1);
        let t = self.ir.and_32(value, one);

        let cpsr = self.ir.get_cpsr();
        let t_mask = self.ir.imm32(!(1 << 5));
        let cleared = self.ir.and_32(cpsr, t_mask);
        let five = self.ir.imm8(5);
        let zero = self.ir.imm1(false);
        let t_bit = self.ir.logical_shift_left(t, five, zero).result;
        let new_cpsr = self.ir.or_32(cleared, t_bit);
        self.ir.set_cpsr(new_cpsr);

        let base_mask = self.ir.imm32(0xFFFF_FFFC);
        let shift1 = self.ir.imm8(1);
        let zero = self.ir.imm1(false);
        let t_shifted = self.ir.logical_shift_left(t, shift1, zero).result;
        let mask = self.ir.or_32(base_mask, t_shifted);
        let pc = self.ir.and_32(value, mask);
        self.ir.set_register(A32Reg::PC, pc);
    }

    pub fn raise_exception(&mut self, exception: Exception) -> bool {
        let pc = self.ir.current_location.pc() as u32;
        let imm = self.ir.imm32(pc);
        self.ir.set_register(A32Reg::PC, imm);
        self.ir.exception_raised(exception);
        if !self.ir.block.has_terminal() {
            self.ir
                .set_term(Terminal::CheckHalt(Box::new(Terminal::ReturnToDispatch)));
        }
        false
    }

    pub fn undefined_instruction(&mut self) -> bool {
        self.raise_exception(Exception::UndefinedInstruction)
    }

    pub fn unpredictable_instruction(&mut self) -> bool {
        self.raise_exception(Exception::UnpredictableInstruction)
    }

    // -- Memory helpers honoring the E bit --

    pub fn read_memory_16(&mut self, addr: Value) -> Value {
        let data = self.ir.read_memory_16(addr);
        if self.ir.current_location.big_endian() {
            self.ir.byte_reverse_half(data)
        } else {
            data
        }
    }

    pub fn read_memory_32(&mut self, addr: Value) -> Value {
        let data = self.ir.read_memory_32(addr);
        if self.ir.current_location.big_endian() {
            self.ir.byte_reverse_word(data)
        } else {
            data
        }
    }

    pub fn write_memory_16(&mut self, addr: Value, value: Value) {
        let value = if self.ir.current_location.big_endian() {
            self.ir.byte_reverse_half(value)
        } else {
            value
        };
        self.ir.write_memory_16(addr, value);
    }

    pub fn write_memory_32(&mut self, addr: Value, value: Value) {
        let value = if self.ir.current_location.big_endian() {
            self.ir.byte_reverse_word(value)
        } else {
            value
        };
        self.ir.write_memory_32(addr, value);
    }

    // -- 32-bit encodings --

    /// BL / BLX (immediate). `hw1`/`hw2` are the two halfwords.
    pub fn thumb32_bl(&mut self, hw1: u32, hw2: u32) -> bool {
        let s = (hw1 >> 10) & 1;
        let imm10 = hw1 & 0x3FF;
        let j1 = (hw2 >> 13) & 1;
        let j2 = (hw2 >> 11) & 1;
        let imm11 = hw2 & 0x7FF;
        let i1 = !(j1 ^ s) & 1;
        let i2 = !(j2 ^ s) & 1;
        let raw = (s << 24) | (i1 << 23) | (i2 << 22) | (imm10 << 12) | (imm11 << 1);
        let offset = ((raw << 7) as i32 >> 7) as i64;

        let return_location = self.ir.current_location.advance_pc(4);
        self.ir.push_rsb(return_location);
        let lr = self.ir.imm32(return_location.pc() as u32 | 1);
        self.ir.set_register(A32Reg::LR, lr);

        let to_arm = hw2 & (1 << 12) == 0;
        if to_arm {
            // BLX: switch to ARM state; base is Align(PC, 4).
            let pc = self.ir.current_location.pc();
            let target_pc = ((pc + 4) & !3).wrapping_add(offset as u64) & 0xFFFF_FFFF;
            let cpsr = self.ir.get_cpsr();
            let t_mask = self.ir.imm32(!(1 << 5));
            let new_cpsr = self.ir.and_32(cpsr, t_mask);
            self.ir.set_cpsr(new_cpsr);
            let target = LocationDescriptor::a32(
                target_pc as u32,
                false,
                self.ir.current_location.big_endian(),
                self.ir.current_location.fp_mode(),
                0,
            );
            self.ir.set_term(Terminal::LinkBlock(target));
        } else {
            let target = self
                .ir
                .current_location
                .advance_pc((offset + 4) as u64);
            self.ir.set_term(Terminal::LinkBlock(target));
        }
        false
    }
}

/// True when `halfword` is the first half of a 32-bit encoding.
pub fn is_thumb32_prefix(halfword: u32) -> bool {
    matches!(halfword >> 11, 0b11101 | 0b11110 | 0b11111)
}

/// Translate one Thumb basic block.
pub fn translate_thumb(
    descriptor: LocationDescriptor,
    cb: &mut dyn TranslateCallbacks,
    options: TranslationOptions,
) -> Block {
    let single_step = options.single_step || descriptor.single_stepping();
    let mut visitor = ThumbTranslatorVisitor::new(descriptor);

    let mut should_continue = true;
    loop {
        let pc = visitor.ir.current_location.pc();
        // The code-read callback returns aligned 32-bit words; pick the
        // halfword out of the word it lands in.
        let word = cb.memory_read_code(pc & !3);
        let halfword = if pc & 2 == 0 { word & 0xFFFF } else { word >> 16 };
        cb.pre_translate_hook(true, pc, &mut visitor.ir);

        let instruction_size = if is_thumb32_prefix(halfword) { 4 } else { 2 };
        visitor.ir.block.record_code_read(pc, instruction_size);

        should_continue = if instruction_size == 4 {
            let word2 = cb.memory_read_code((pc + 2) & !3);
            let hw2 = if (pc + 2) & 2 == 0 {
                word2 & 0xFFFF
            } else {
                word2 >> 16
            };
            if halfword >> 11 == 0b11110 && hw2 & (1 << 14) != 0 {
                visitor.thumb32_bl(halfword, hw2)
            } else {
                visitor.undefined_instruction()
            }
        } else if let Some(matcher) = decode::thumb16_table().lookup(halfword) {
            (matcher.handler)(&mut visitor, halfword)
        } else {
            visitor.undefined_instruction()
        };

        visitor.ir.current_location = visitor.ir.current_location.advance_pc(instruction_size);
        visitor.ir.block.add_cycle();

        if !should_continue || single_step {
            break;
        }
        if visitor.ir.block.cycle_count() >= MAX_INSTRUCTIONS_PER_BLOCK {
            break;
        }
    }

    if should_continue {
        if single_step {
            visitor
                .ir
                .set_term(Terminal::LinkBlock(visitor.ir.current_location));
        } else {
            visitor
                .ir
                .set_term(Terminal::LinkBlockFast(visitor.ir.current_location));
        }
    }

    assert!(visitor.ir.block.has_terminal(), "terminal has not been set");

    let end = visitor.ir.current_location;
    visitor.ir.block.set_end_location(end);
    visitor.ir.block
}

/// Condition gate for Thumb conditional branches: lowered as a terminal
/// rather than an entry condition.
pub(crate) fn cond_from_thumb(bits: u32) -> Option<Cond> {
    match bits {
        0b1110 | 0b1111 => None,
        c => Some(Cond::from_bits(c)),
    }
}
