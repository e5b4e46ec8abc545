//! Critical-instruction classifier.
//!
//! An instruction is critical when deleting it could change observable
//! behavior. Critical instructions seed liveness and are never swept.

use crate::ir::Instruction;

/// Returns true for stores, returns, calls, branches, phis, allocas and loads.
///
/// Calls are critical even when the callee is known to be pure, and loads
/// are critical even when their value is unused: without alias analysis a
/// load cannot be proven free of effects (it may trap or touch volatile
/// memory).
pub fn is_critical(instr: &Instruction) -> bool {
    let kind = &instr.kind;
    kind.is_store()
        || kind.is_ret()
        || kind.is_call()
        || kind.is_br()
        || kind.is_phi()
        || kind.is_alloca()
        || kind.is_load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, BlockId, CastOp, CmpPred, FuncId, InstrKind};

    fn instr(kind: InstrKind) -> Instruction {
        Instruction {
            kind,
            operands: vec![],
            parent: BlockId(0),
        }
    }

    #[test]
    fn effectful_kinds_are_critical() {
        for kind in [
            InstrKind::Store,
            InstrKind::Ret,
            InstrKind::Call { callee: FuncId(0) },
            InstrKind::Br { target: BlockId(1) },
            InstrKind::CondBr {
                if_true: BlockId(1),
                if_false: BlockId(2),
            },
            InstrKind::Phi { incoming: vec![] },
            InstrKind::Alloca,
            InstrKind::Load,
        ] {
            assert!(is_critical(&instr(kind.clone())), "{kind:?}");
        }
    }

    #[test]
    fn value_kinds_are_not_critical() {
        for kind in [
            InstrKind::Binary(BinOp::Add),
            InstrKind::Binary(BinOp::SDiv),
            InstrKind::ICmp(CmpPred::Eq),
            InstrKind::FCmp(CmpPred::Lt),
            InstrKind::Cast(CastOp::ZExt),
            InstrKind::Gep,
        ] {
            assert!(!is_critical(&instr(kind.clone())), "{kind:?}");
        }
    }
}
