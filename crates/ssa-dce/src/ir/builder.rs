//! Instruction builder.
//!
//! `FunctionBuilder` appends instructions at the end of a current block,
//! one typed method per instruction kind.

use super::function::Function;
use super::types::{BinOp, BlockId, CastOp, CmpPred, FuncId, InstrId, InstrKind, Operand};
use anyhow::Result;

/// Appends instructions to a function, block by block.
#[derive(Debug)]
pub struct FunctionBuilder<'a> {
    func: &'a mut Function,
    current_block: BlockId,
}

impl<'a> FunctionBuilder<'a> {
    /// Starts building into `func`. If the function has no blocks yet, its
    /// entry block is created and selected.
    pub fn new(func: &'a mut Function) -> Self {
        let current_block = if func.is_declaration() {
            func.add_block()
        } else {
            func.entry_block()
        };
        Self {
            func,
            current_block,
        }
    }

    /// Creates a new block without switching to it.
    pub fn new_block(&mut self) -> BlockId {
        self.func.add_block()
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn alloca(&mut self) -> Result<InstrId> {
        self.emit(InstrKind::Alloca, vec![])
    }

    pub fn load(&mut self, ptr: Operand) -> Result<InstrId> {
        self.emit(InstrKind::Load, vec![ptr])
    }

    pub fn store(&mut self, value: Operand, ptr: Operand) -> Result<InstrId> {
        self.emit(InstrKind::Store, vec![value, ptr])
    }

    pub fn call(&mut self, callee: FuncId, args: Vec<Operand>) -> Result<InstrId> {
        self.emit(InstrKind::Call { callee }, args)
    }

    pub fn ret(&mut self, value: Option<Operand>) -> Result<InstrId> {
        self.emit(InstrKind::Ret, value.into_iter().collect())
    }

    pub fn br(&mut self, target: BlockId) -> Result<InstrId> {
        self.emit(InstrKind::Br { target }, vec![])
    }

    pub fn cond_br(
        &mut self,
        condition: Operand,
        if_true: BlockId,
        if_false: BlockId,
    ) -> Result<InstrId> {
        self.emit(InstrKind::CondBr { if_true, if_false }, vec![condition])
    }

    /// Emits a phi. Incoming values may be filled in later with
    /// [`Function::set_operands`] when they are defined after the phi.
    pub fn phi(&mut self, incoming: Vec<(Operand, BlockId)>) -> Result<InstrId> {
        let (operands, blocks): (Vec<Operand>, Vec<BlockId>) = incoming.into_iter().unzip();
        self.emit(InstrKind::Phi { incoming: blocks }, operands)
    }

    pub fn binary(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> Result<InstrId> {
        self.emit(InstrKind::Binary(op), vec![lhs, rhs])
    }

    pub fn icmp(&mut self, pred: CmpPred, lhs: Operand, rhs: Operand) -> Result<InstrId> {
        self.emit(InstrKind::ICmp(pred), vec![lhs, rhs])
    }

    pub fn cast(&mut self, op: CastOp, value: Operand) -> Result<InstrId> {
        self.emit(InstrKind::Cast(op), vec![value])
    }

    fn emit(&mut self, kind: InstrKind, operands: Vec<Operand>) -> Result<InstrId> {
        self.func.append_instr(self.current_block, kind, operands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_into_entry_then_new_block() {
        let mut func = Function::new(FuncId(0), "f", 1);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.current_block();
        let next = b.new_block();
        let x = b.binary(BinOp::Add, Operand::Arg(0), Operand::int(1)).unwrap();
        b.br(next).unwrap();
        b.switch_to(next);
        b.ret(Some(x.into())).unwrap();

        assert_eq!(func.entry_block(), entry);
        assert_eq!(func.block(entry).unwrap().instructions().len(), 2);
        assert_eq!(func.block(next).unwrap().instructions().len(), 1);
        assert_eq!(func.users(x).count(), 1);
    }

    #[test]
    fn phi_incoming_pairs_split_into_kind_and_operands() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.current_block();
        let p = b.phi(vec![(Operand::int(7), entry)]).unwrap();
        let instr = func.instr(p).unwrap();
        assert_eq!(instr.kind, InstrKind::Phi { incoming: vec![entry] });
        assert_eq!(instr.operands, vec![Operand::int(7)]);
    }
}
