//! IR consistency checks: operand types against the opcode table, and
//! exact use counts. Failures here are translator or pass bugs.

use crate::block::Block;
use crate::opcode::Opcode;
use crate::types::Type;

pub fn verification_pass(block: &Block) {
    let mut actual_uses = vec![0u32; block.len()];

    for idx in block.indices() {
        let inst = block.inst(idx);
        if inst.op == Opcode::Void {
            continue;
        }

        let decl = inst.op.arg_types();
        assert_eq!(
            inst.num_args(),
            decl.len(),
            "{}: argument count mismatch",
            inst.op.name()
        );
        for (i, (&arg, &ty)) in inst.args().iter().zip(decl).enumerate() {
            assert!(
                ty == Type::Opaque || arg.ty() == ty,
                "{}: arg {} has type {}, declared {}",
                inst.op.name(),
                i,
                arg.ty(),
                ty
            );
            if let Some(src) = arg.inst() {
                assert!(
                    src < idx,
                    "{}: forward reference to %{}",
                    inst.op.name(),
                    src.0
                );
                assert!(
                    block.inst(src).op != Opcode::Void,
                    "{}: argument references a removed instruction",
                    inst.op.name()
                );
                actual_uses[src.index()] += 1;
            }
        }
    }

    for idx in block.indices() {
        let inst = block.inst(idx);
        if inst.op == Opcode::Void {
            continue;
        }
        assert_eq!(
            inst.use_count(),
            actual_uses[idx.index()],
            "{}: recorded use count {} != actual {}",
            inst.op.name(),
            inst.use_count(),
            actual_uses[idx.index()]
        );
    }

    assert!(block.has_terminal(), "block has no terminal");
}
