//! Human-readable IR dump, used by `Jit::disassemble` and test failure
//! output.

use std::fmt;

use crate::block::{Block, Terminal};
use crate::opcode::Opcode;
use crate::value::Value;

fn fmt_value(f: &mut fmt::Formatter<'_>, v: Value) -> fmt::Result {
    match v {
        Value::Inst(idx, _) => write!(f, "%{}", idx.0),
        Value::ImmU1(b) => write!(f, "u1 {}", u8::from(b)),
        Value::ImmU8(x) => write!(f, "u8 {x:#x}"),
        Value::ImmU16(x) => write!(f, "u16 {x:#x}"),
        Value::ImmU32(x) => write!(f, "u32 {x:#x}"),
        Value::ImmU64(x) => write!(f, "u64 {x:#x}"),
        Value::ImmA32Reg(r) => write!(f, "{r:?}"),
        Value::ImmA32ExtReg(r) => write!(f, "{r:?}"),
        Value::ImmA64Reg(r) => write!(f, "X{}", r.0),
        Value::ImmA64Vec(r) => write!(f, "Q{}", r.0),
        Value::ImmCond(c) => write!(f, "{c:?}"),
    }
}

fn fmt_terminal(f: &mut fmt::Formatter<'_>, term: &Terminal) -> fmt::Result {
    match term {
        Terminal::Invalid => write!(f, "<invalid>"),
        Terminal::Interpret(loc) => write!(f, "Interpret{{{loc:?}}}"),
        Terminal::ReturnToDispatch => write!(f, "ReturnToDispatch"),
        Terminal::LinkBlock(loc) => write!(f, "LinkBlock{{{loc:?}}}"),
        Terminal::LinkBlockFast(loc) => write!(f, "LinkBlockFast{{{loc:?}}}"),
        Terminal::PopRSBHint => write!(f, "PopRSBHint"),
        Terminal::If { cond, then_, else_ } => {
            write!(f, "If{{{cond:?}, ")?;
            fmt_terminal(f, then_)?;
            write!(f, ", ")?;
            fmt_terminal(f, else_)?;
            write!(f, "}}")
        }
        Terminal::CheckHalt(else_) => {
            write!(f, "CheckHalt{{")?;
            fmt_terminal(f, else_)?;
            write!(f, "}}")
        }
        Terminal::CheckBit { then_, else_ } => {
            write!(f, "CheckBit{{")?;
            fmt_terminal(f, then_)?;
            write!(f, ", ")?;
            fmt_terminal(f, else_)?;
            write!(f, "}}")
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block: location={:?}", self.location())?;
        writeln!(
            f,
            "cycles: {}, condition: {:?}",
            self.cycle_count(),
            self.condition()
        )?;
        if let Some(fail) = self.condition_failed_location() {
            writeln!(f, "cond-failed: {fail:?}")?;
        }
        for idx in self.indices() {
            let inst = self.inst(idx);
            if inst.op == Opcode::Void {
                continue;
            }
            write!(f, "[{:04}] ", idx.0)?;
            if inst.result_type() != crate::types::Type::Void {
                write!(f, "%{:<4} = ", idx.0)?;
            } else {
                write!(f, "        ")?;
            }
            write!(f, "{}", inst.op.name())?;
            for (i, &arg) in inst.args().iter().enumerate() {
                write!(f, "{}", if i == 0 { " " } else { ", " })?;
                fmt_value(f, arg)?;
            }
            writeln!(f, " (uses: {})", inst.use_count())?;
        }
        write!(f, "terminal = ")?;
        fmt_terminal(f, self.terminal())?;
        writeln!(f)
    }
}
