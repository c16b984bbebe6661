//! A64 frontend.
//!
//! Little-endian only, no conditional-execution machinery; conditional
//! control flow lowers to the `If` and `CheckBit` terminals. Register
//! 31 decodes as the zero register for data-processing operands and as
//! SP for addressing and the ADD/SUB immediate forms.

mod decode;
mod instructions;

use dbt_ir::block::Terminal;
use dbt_ir::{A64Reg, Block, Exception, IrEmitter, LocationDescriptor, Value};

use crate::{TranslateCallbacks, TranslationOptions};

use super::a32::MAX_INSTRUCTIONS_PER_BLOCK;

pub struct A64TranslatorVisitor {
    pub ir: IrEmitter,
}

impl A64TranslatorVisitor {
    pub fn new(descriptor: LocationDescriptor) -> Self {
        A64TranslatorVisitor {
            ir: IrEmitter::new(descriptor),
        }
    }

    /// X operand; register 31 reads as zero.
    pub fn x_or_zero(&mut self, r: u32) -> Value {
        if r == 31 {
            self.ir.imm64(0)
        } else {
            self.ir.a64_get_x(A64Reg::from_bits(r))
        }
    }

    /// W operand; register 31 reads as zero.
    pub fn w_or_zero(&mut self, r: u32) -> Value {
        if r == 31 {
            self.ir.imm32(0)
        } else {
            self.ir.a64_get_w(A64Reg::from_bits(r))
        }
    }

    /// Operand of either width, driven by the sf bit.
    pub fn operand(&mut self, sf: bool, r: u32) -> Value {
        if sf {
            self.x_or_zero(r)
        } else {
            self.w_or_zero(r)
        }
    }

    /// X operand; register 31 reads as SP.
    pub fn x_or_sp(&mut self, r: u32) -> Value {
        if r == 31 {
            self.ir.a64_get_sp()
        } else {
            self.ir.a64_get_x(A64Reg::from_bits(r))
        }
    }

    /// Result write; register 31 discards.
    pub fn set_result(&mut self, sf: bool, r: u32, value: Value) {
        if r == 31 {
            return;
        }
        let reg = A64Reg::from_bits(r);
        if sf {
            self.ir.a64_set_x(reg, value);
        } else {
            self.ir.a64_set_w(reg, value);
        }
    }

    /// Result write; register 31 writes SP.
    pub fn set_x_or_sp(&mut self, r: u32, value: Value) {
        if r == 31 {
            self.ir.a64_set_sp(value);
        } else {
            self.ir.a64_set_x(A64Reg::from_bits(r), value);
        }
    }

    pub fn raise_exception(&mut self, exception: Exception) -> bool {
        let pc = self.ir.current_location.pc();
        let imm = self.ir.imm64(pc);
        self.ir.a64_set_pc(imm);
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
}

/// Translate one A64 basic block.
pub fn translate_a64(
    descriptor: LocationDescriptor,
    cb: &mut dyn TranslateCallbacks,
    options: TranslationOptions,
) -> Block {
    let single_step = options.single_step || descriptor.single_stepping();
    let mut visitor = A64TranslatorVisitor::new(descriptor);

    let mut should_continue;
    loop {
        let pc = visitor.ir.current_location.pc();
        let instruction = cb.memory_read_code(pc);
        visitor.ir.block.record_code_read(pc, 4);
        cb.pre_translate_hook(false, pc, &mut visitor.ir);

        should_continue = if let Some(matcher) = decode::a64_table().lookup(instruction) {
            (matcher.handler)(&mut visitor, instruction)
        } else {
            visitor.undefined_instruction()
        };

        visitor.ir.current_location = visitor.ir.current_location.advance_pc(4);
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
