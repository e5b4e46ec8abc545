//! Sweep: delete every instruction the last mark left unmarked.

use super::critical::is_critical;
use super::mark::Liveness;
use crate::ir::{Function, InstrId};
use std::collections::BTreeSet;

/// Erases unmarked, non-critical instructions and returns how many were erased.
///
/// The unmarked set is closed under "user of": a live instruction's operands
/// are live, so every user of an unmarked instruction is itself unmarked and
/// erased in the same call. No surviving instruction is left reading an
/// erased one.
pub fn sweep(func: &mut Function, liveness: &Liveness) -> usize {
    let dead: BTreeSet<InstrId> = func
        .instructions()
        .filter(|(id, instr)| !liveness.is_live(*id) && !is_critical(instr))
        .map(|(id, _)| id)
        .collect();
    func.erase_instrs(&dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, FuncId, FunctionBuilder, InstrKind, Operand};
    use crate::optimizer::mark::mark;

    #[test]
    fn unused_pure_instruction_removed() {
        // x = mul 3, 4 with no uses
        let mut func = Function::new(FuncId(0), "f", 0);
        let mut b = FunctionBuilder::new(&mut func);
        let x = b.binary(BinOp::Mul, Operand::int(3), Operand::int(4)).unwrap();
        b.ret(None).unwrap();

        let liveness = mark(&func);
        assert_eq!(sweep(&mut func, &liveness), 1);
        assert!(!func.contains_instr(x));
        assert_eq!(func.num_instrs(), 1);
    }

    #[test]
    fn dead_chain_removed_in_one_sweep() {
        // v0 = add 1, 2 ; v1 = mul v0, v0 ; v2 = sub v1, v0 ; ret
        let mut func = Function::new(FuncId(0), "f", 0);
        let mut b = FunctionBuilder::new(&mut func);
        let v0 = b.binary(BinOp::Add, Operand::int(1), Operand::int(2)).unwrap();
        let v1 = b.binary(BinOp::Mul, v0.into(), v0.into()).unwrap();
        b.binary(BinOp::Sub, v1.into(), v0.into()).unwrap();
        b.ret(None).unwrap();

        let liveness = mark(&func);
        assert_eq!(sweep(&mut func, &liveness), 3);
        assert_eq!(func.num_instrs(), 1);
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn unused_call_and_load_kept() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let mut b = FunctionBuilder::new(&mut func);
        let p = b.alloca().unwrap();
        b.load(p.into()).unwrap();
        b.call(FuncId(0), vec![]).unwrap();
        b.ret(None).unwrap();

        let liveness = mark(&func);
        assert_eq!(sweep(&mut func, &liveness), 0);
        assert_eq!(func.num_instrs(), 4);
    }

    #[test]
    fn never_removes_critical_even_if_unmarked() {
        // An empty liveness (no mark run) must still leave critical kinds alone.
        let mut func = Function::new(FuncId(0), "f", 0);
        let mut b = FunctionBuilder::new(&mut func);
        let p = b.alloca().unwrap();
        b.store(Operand::int(1), p.into()).unwrap();
        b.binary(BinOp::Add, Operand::int(1), Operand::int(1)).unwrap();
        b.ret(None).unwrap();

        assert_eq!(sweep(&mut func, &Liveness::default()), 1);
        let kinds: Vec<InstrKind> = func.instructions().map(|(_, i)| i.kind.clone()).collect();
        assert_eq!(kinds, vec![InstrKind::Alloca, InstrKind::Store, InstrKind::Ret]);
    }

    #[test]
    fn no_dangling_operands_after_sweep() {
        let mut func = Function::new(FuncId(0), "f", 1);
        let mut b = FunctionBuilder::new(&mut func);
        let a = b.binary(BinOp::Add, Operand::Arg(0), Operand::int(1)).unwrap();
        let dead = b.binary(BinOp::Mul, a.into(), Operand::int(2)).unwrap();
        b.binary(BinOp::Xor, dead.into(), a.into()).unwrap();
        b.ret(Some(a.into())).unwrap();

        let liveness = mark(&func);
        assert_eq!(sweep(&mut func, &liveness), 2);
        for (_, instr) in func.instructions() {
            for dep in instr.instr_operands() {
                assert!(func.contains_instr(dep));
            }
        }
        assert_eq!(func.users(a).count(), 1);
        func.verify_use_lists().unwrap();
    }
}
