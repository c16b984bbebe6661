//! A32 (ARM) frontend.
//!
//! The decode tables live in [`decode`]; the visitor methods are split
//! by instruction category across the sibling modules. Conditional
//! execution is handled by a small state machine: a block either has no
//! entry condition, is being built under one shared condition, has a
//! trailing unconditional part, or must be cut because the condition
//! changed.

pub mod asimd;
mod branch;
pub mod decode;
mod data_processing;
mod exception;
mod load_store;
mod status;
mod sync;
pub mod vfp;

use dbt_ir::block::Terminal;
use dbt_ir::{
    A32Reg, Block, Cond, Exception, IrEmitter, LocationDescriptor, Opcode, Value,
};

use crate::{TranslateCallbacks, TranslationOptions};

/// Upper bound on guest instructions lowered into one block.
pub const MAX_INSTRUCTIONS_PER_BLOCK: u64 = 128;

/// Conditional-translation state (A32/Thumb only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalState {
    /// No conditional instruction seen yet.
    None,
    /// Instructions under the block's shared condition are being
    /// translated; new instructions must carry the same condition.
    Translating,
    /// The shared condition has ended; the rest is unconditional.
    Trailing,
    /// A condition change forced termination.
    Break,
}

/// Barrel-shifter operation selected by the instruction's shift field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftType {
    LSL,
    LSR,
    ASR,
    ROR,
}

impl ShiftType {
    pub fn from_bits(bits: u32) -> ShiftType {
        match bits & 3 {
            0 => ShiftType::LSL,
            1 => ShiftType::LSR,
            2 => ShiftType::ASR,
            _ => ShiftType::ROR,
        }
    }
}

pub struct ArmTranslatorVisitor {
    pub ir: IrEmitter,
    pub options: TranslationOptions,
    pub cond_state: ConditionalState,
}

impl ArmTranslatorVisitor {
    pub fn new(descriptor: LocationDescriptor, options: TranslationOptions) -> Self {
        ArmTranslatorVisitor {
            ir: IrEmitter::new(descriptor),
            options,
            cond_state: ConditionalState::None,
        }
    }

    fn instruction_size(&self) -> u64 {
        4
    }

    /// Condition gate run at the top of every visitor method. Returns
    /// false when the instruction's IR must not be emitted (the caller
    /// then returns `true` so the loop can decide whether to go on).
    pub fn condition_passed(&mut self, cond: Cond) -> bool {
        assert!(
            self.cond_state != ConditionalState::Break,
            "requested a break but it was not honored"
        );

        if cond == Cond::NV {
            // NV space is unpredictable here. The break path skips the
            // loop's cycle accounting, so charge this instruction now.
            self.ir.block.add_cycle();
            self.raise_exception(Exception::UnpredictableInstruction);
            self.cond_state = ConditionalState::Break;
            return false;
        }

        if self.cond_state == ConditionalState::Translating {
            if self.ir.block.condition_failed_location() != Some(self.ir.current_location)
                || cond == Cond::AL
            {
                self.cond_state = ConditionalState::Trailing;
            } else {
                if cond == self.ir.block.condition() {
                    let next = self.ir.current_location.advance_pc(self.instruction_size());
                    self.ir.block.set_condition_failed_location(next);
                    let n = self.ir.block.condition_failed_cycle_count();
                    self.ir.block.set_condition_failed_cycle_count(n + 1);
                    return true;
                }

                // The condition changed: cut the block here.
                self.cond_state = ConditionalState::Break;
                self.ir
                    .set_term(Terminal::LinkBlockFast(self.ir.current_location));
                return false;
            }
        }

        if cond == Cond::AL {
            return true;
        }

        // A conditional instruction after unconditional ones: cut and
        // start a fresh block whose entry condition covers it.
        if !self.ir.block.is_empty() {
            self.cond_state = ConditionalState::Break;
            self.ir
                .set_term(Terminal::LinkBlockFast(self.ir.current_location));
            return false;
        }

        self.cond_state = ConditionalState::Translating;
        self.ir.block.set_condition(cond);
        let next = self.ir.current_location.advance_pc(self.instruction_size());
        self.ir.block.set_condition_failed_location(next);
        let n = self.ir.block.cycle_count();
        self.ir.block.set_condition_failed_cycle_count(n + 1);
        true
    }

    // -- Register access --

    /// Read a register; R15 reads as the current instruction address
    /// plus 8 (ARM-state prefetch offset).
    pub fn reg(&mut self, r: A32Reg) -> Value {
        if r == A32Reg::PC {
            let pc = self.ir.current_location.pc() as u32;
            self.ir.imm32(pc.wrapping_add(8))
        } else {
            self.ir.get_register(r)
        }
    }

    /// ALU result write; a write to R15 is an interworking branch.
    /// Returns the visitor's should-continue value.
    pub fn set_reg_or_branch(&mut self, d: A32Reg, value: Value) -> bool {
        if d == A32Reg::PC {
            self.bx_write_pc(value);
            self.ir.set_term(Terminal::ReturnToDispatch);
            false
        } else {
            self.ir.set_register(d, value);
            true
        }
    }

    /// BX-style PC write: bit 0 selects Thumb state; the PC is aligned
    /// accordingly and the CPSR T bit updated.
    pub fn bx_write_pc(&mut self, value: Value) {
        let one = self.ir.imm32(1);
        let t = self.ir.and_32(value, one);

        // Update CPSR.T (bit 5).
        let cpsr = self.ir.get_cpsr();
        let t_mask = self.ir.imm32(!(1 << 5));
        let cleared = self.ir.and_32(cpsr, t_mask);
        let five = self.ir.imm8(5);
        let zero = self.ir.imm1(false);
        let t_bit = self.ir.logical_shift_left(t, five, zero).result;
        let new_cpsr = self.ir.or_32(cleared, t_bit);
        self.ir.set_cpsr(new_cpsr);

        // mask = 0xFFFFFFFE when entering Thumb, 0xFFFFFFFC otherwise.
        let base_mask = self.ir.imm32(0xFFFF_FFFC);
        let shift1 = self.ir.imm8(1);
        let zero = self.ir.imm1(false);
        let t_shifted = self.ir.logical_shift_left(t, shift1, zero).result;
        let mask = self.ir.or_32(base_mask, t_shifted);
        let pc = self.ir.and_32(value, mask);
        self.ir.set_register(A32Reg::PC, pc);
    }

    // -- Exceptions --

    /// Store the faulting PC, surface the exception and terminate.
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

    // -- Operand helpers --

    /// ARM immediate expansion: `imm8` rotated right by `2 * rotate`.
    /// The carry-out equals the carry-in when the rotation is zero,
    /// otherwise bit 31 of the result.
    pub fn expand_imm_c(&mut self, rotate: u32, imm8: u32, carry_in: Value) -> (u32, Value) {
        let imm32 = imm8.rotate_right(2 * rotate);
        let carry = if rotate == 0 {
            carry_in
        } else {
            self.ir.imm1(imm32 >> 31 != 0)
        };
        (imm32, carry)
    }

    pub fn expand_imm(&mut self, rotate: u32, imm8: u32) -> u32 {
        imm8.rotate_right(2 * rotate)
    }

    /// Immediate-shift decode + emit. `imm5 == 0` selects the special
    /// encodings (LSR/ASR #32, RRX).
    pub fn emit_imm_shift(
        &mut self,
        value: Value,
        shift_type: ShiftType,
        imm5: u32,
        carry_in: Value,
    ) -> dbt_ir::ResultAndCarry {
        match shift_type {
            ShiftType::LSL => {
                let n = self.ir.imm8(imm5 as u8);
                self.ir.logical_shift_left(value, n, carry_in)
            }
            ShiftType::LSR => {
                let n = self.ir.imm8(if imm5 == 0 { 32 } else { imm5 as u8 });
                self.ir.logical_shift_right(value, n, carry_in)
            }
            ShiftType::ASR => {
                let n = self.ir.imm8(if imm5 == 0 { 32 } else { imm5 as u8 });
                self.ir.arithmetic_shift_right(value, n, carry_in)
            }
            ShiftType::ROR => {
                if imm5 == 0 {
                    self.ir.rotate_right_extended(value, carry_in)
                } else {
                    let n = self.ir.imm8(imm5 as u8);
                    self.ir.rotate_right(value, n, carry_in)
                }
            }
        }
    }

    /// N and Z from the result, C and V from the operation's
    /// companions. The flag tail of arithmetic instructions.
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

    // -- Memory access with guest-endianness handling --

    pub fn read_memory_8(&mut self, addr: Value) -> Value {
        self.ir.read_memory_8(addr)
    }

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

    pub fn write_memory_8(&mut self, addr: Value, value: Value) {
        self.ir.write_memory_8(addr, value);
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
}

/// True while the conditional-state machine permits appending more
/// instructions. Conservative: once a condition is active, any
/// CPSR-writing instruction ends the block.
fn cond_can_continue(visitor: &ArmTranslatorVisitor) -> bool {
    assert!(visitor.cond_state != ConditionalState::Break);

    if visitor.cond_state == ConditionalState::None {
        return true;
    }

    visitor
        .ir
        .block
        .indices()
        .all(|idx| !writes_cpsr(visitor.ir.block.inst(idx).op))
}

fn writes_cpsr(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::SetNFlag
            | Opcode::SetZFlag
            | Opcode::SetCFlag
            | Opcode::SetVFlag
            | Opcode::SetCpsrNzcv
            | Opcode::A32SetCpsr
    )
}

/// Translate one A32 basic block.
pub fn translate_arm(
    descriptor: LocationDescriptor,
    cb: &mut dyn TranslateCallbacks,
    options: TranslationOptions,
) -> Block {
    let single_step = options.single_step || descriptor.single_stepping();
    let mut visitor = ArmTranslatorVisitor::new(descriptor, options);

    let mut should_continue = true;
    loop {
        let pc = visitor.ir.current_location.pc();
        let instruction = cb.memory_read_code(pc);
        visitor.ir.block.record_code_read(pc, 4);
        cb.pre_translate_hook(false, pc, &mut visitor.ir);

        // Sub-decoder priority: VFP, then ASIMD, then the main table.
        // VFP shares no encodings with the unconditional (cond=1111)
        // space, which is excluded by a pre-check.
        let cond_bits = instruction >> 28;
        should_continue = if cond_bits != 0b1111 {
            if let Some(matcher) = vfp::table().lookup(instruction) {
                (matcher.handler)(&mut visitor, instruction)
            } else if let Some(matcher) = decode::arm_table().lookup(instruction) {
                (matcher.handler)(&mut visitor, instruction)
            } else {
                visitor.undefined_instruction()
            }
        } else if let Some(matcher) = asimd::table().lookup(instruction) {
            (matcher.handler)(&mut visitor, instruction)
        } else if let Some(matcher) = decode::arm_table().lookup(instruction) {
            (matcher.handler)(&mut visitor, instruction)
        } else {
            visitor.undefined_instruction()
        };

        if visitor.cond_state == ConditionalState::Break {
            break;
        }

        visitor.ir.current_location = visitor.ir.current_location.advance_pc(4);
        visitor.ir.block.add_cycle();

        if !(should_continue && cond_can_continue(&visitor) && !single_step) {
            break;
        }
        if visitor.ir.block.cycle_count() >= MAX_INSTRUCTIONS_PER_BLOCK {
            break;
        }
    }

    if matches!(
        visitor.cond_state,
        ConditionalState::Translating | ConditionalState::Trailing
    ) || single_step
    {
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
    }

    if should_continue && !visitor.ir.block.has_terminal() {
        // Unconditional straight-line block cut by the length limit.
        visitor
            .ir
            .set_term(Terminal::LinkBlockFast(visitor.ir.current_location));
    }

    assert!(visitor.ir.block.has_terminal(), "terminal has not been set");

    let end = visitor.ir.current_location;
    visitor.ir.block.set_end_location(end);
    visitor.ir.block
}
