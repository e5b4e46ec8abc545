//! Function bodies: basic blocks over an instruction arena with use-lists.
//!
//! Instructions live in a per-function arena and are addressed by `InstrId`.
//! Blocks hold ordered lists of handles into that arena. Every instruction
//! slot also records its *users*, the instructions that name it as an
//! operand. All mutation goes through `Function` methods so the use-lists
//! stay in sync with the operand lists.

use super::types::{BasicBlock, BlockId, FuncId, InstrId, InstrKind, Instruction, Operand};
use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;

#[derive(Debug, Clone)]
struct InstrSlot {
    instr: Instruction,
    users: BTreeSet<InstrId>,
}

/// IR representation of a complete function.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    pub num_params: u32,

    /// All basic blocks, in layout order.
    blocks: Vec<BasicBlock>,

    /// Entry block (where execution starts).
    ///
    /// INVARIANT: This is always `BlockId(0)`, the first block created.
    entry_block: BlockId,

    /// Instruction arena. Erased instructions leave a `None` hole so that
    /// handles of surviving instructions never move.
    instrs: Vec<Option<InstrSlot>>,

    next_block: u32,
}

impl Function {
    pub fn new(id: FuncId, name: impl Into<String>, num_params: u32) -> Self {
        Self {
            id,
            name: name.into(),
            num_params,
            blocks: Vec::new(),
            entry_block: BlockId(0),
            instrs: Vec::new(),
            next_block: 0,
        }
    }

    /// A function without blocks is an external declaration.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry_block
    }

    /// Appends a new empty block. The first block created is the entry block.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.push(BasicBlock::new(id));
        id
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Number of instructions currently placed in blocks.
    pub fn num_instrs(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }

    pub fn instr(&self, id: InstrId) -> Option<&Instruction> {
        self.slot(id).map(|s| &s.instr)
    }

    pub fn contains_instr(&self, id: InstrId) -> bool {
        self.slot(id).is_some()
    }

    /// Use-list of `id`: every instruction that reads it, in handle order.
    pub fn users(&self, id: InstrId) -> impl Iterator<Item = InstrId> + '_ {
        self.slot(id)
            .into_iter()
            .flat_map(|s| s.users.iter().copied())
    }

    pub fn has_users(&self, id: InstrId) -> bool {
        self.slot(id).is_some_and(|s| !s.users.is_empty())
    }

    /// All instruction handles in program order (block order, then in-block order).
    pub fn instr_ids(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter().copied())
    }

    /// All instructions in program order, paired with their handles.
    pub fn instructions(&self) -> impl Iterator<Item = (InstrId, &Instruction)> + '_ {
        self.instr_ids()
            .filter_map(move |id| self.instr(id).map(|instr| (id, instr)))
    }

    /// Appends an instruction at the end of `block`.
    ///
    /// Every `Operand::Instr` must name an existing instruction; use
    /// [`Function::set_operands`] afterwards for forward references.
    pub fn append_instr(
        &mut self,
        block: BlockId,
        kind: InstrKind,
        operands: Vec<Operand>,
    ) -> Result<InstrId> {
        let Some(block_idx) = self.blocks.iter().position(|b| b.id == block) else {
            bail!("function @{}: block {} does not exist", self.name, block);
        };
        self.check_operands(&operands)?;

        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(Some(InstrSlot {
            instr: Instruction {
                kind,
                operands: Vec::new(),
                parent: block,
            },
            users: BTreeSet::new(),
        }));
        self.relink(id, operands);
        self.blocks[block_idx].instructions.push(id);
        Ok(id)
    }

    /// Replaces the operand list of `id`, updating use-lists on both sides.
    pub fn set_operands(&mut self, id: InstrId, operands: Vec<Operand>) -> Result<()> {
        if !self.contains_instr(id) {
            bail!("function @{}: instruction {} does not exist", self.name, id);
        }
        self.check_operands(&operands)?;
        self.relink(id, operands);
        Ok(())
    }

    /// Blocks `block` can transfer control to, in branch-operand order.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let Some(block) = self.block(block) else {
            return vec![];
        };
        block
            .instructions
            .iter()
            .filter_map(|&id| self.instr(id))
            .flat_map(|instr| instr.kind.successors())
            .collect()
    }

    /// Build a map from each block ID to the set of *distinct* predecessor block IDs.
    pub fn predecessors(&self) -> HashMap<BlockId, BTreeSet<BlockId>> {
        let mut preds: HashMap<BlockId, BTreeSet<BlockId>> = HashMap::new();
        // Ensure every block has an entry (even if no predecessors).
        for block in &self.blocks {
            preds.entry(block.id).or_default();
        }
        for block in &self.blocks {
            for succ in self.successors(block.id) {
                preds.entry(succ).or_default().insert(block.id);
            }
        }
        preds
    }

    /// Erases a single instruction. Returns `false` if it did not exist.
    pub fn erase_instr(&mut self, id: InstrId) -> bool {
        self.erase_instrs(&BTreeSet::from([id])) == 1
    }

    /// Erases a set of instructions and returns how many were removed.
    ///
    /// Erased instructions are dropped from their blocks and from the
    /// use-lists of their operands. A surviving instruction that still reads
    /// an erased one has that operand slot rewritten to `Operand::Undef`, so
    /// no instruction is ever left holding a dangling handle.
    pub fn erase_instrs(&mut self, ids: &BTreeSet<InstrId>) -> usize {
        let mut erased: Vec<(InstrId, BTreeSet<InstrId>)> = Vec::new();

        for &id in ids {
            let Some(slot) = self.instrs.get_mut(id.0 as usize).and_then(Option::take) else {
                continue;
            };
            for dep in slot.instr.instr_operands() {
                if let Some(dep_slot) = self.slot_mut(dep) {
                    dep_slot.users.remove(&id);
                }
            }
            erased.push((id, slot.users));
        }

        if erased.is_empty() {
            return 0;
        }

        let gone: HashSet<InstrId> = erased.iter().map(|(id, _)| *id).collect();
        for block in &mut self.blocks {
            block.instructions.retain(|id| !gone.contains(id));
        }

        for (id, users) in &erased {
            for &user in users {
                let Some(user_slot) = self.slot_mut(user) else {
                    continue;
                };
                for op in &mut user_slot.instr.operands {
                    if *op == Operand::Instr(*id) {
                        *op = Operand::Undef;
                    }
                }
                trace!("replaced use of erased {} in {} with undef", id, user);
            }
        }

        erased.len()
    }

    /// Removes blocks together with every instruction they contain.
    ///
    /// Phi nodes in the remaining blocks lose their incoming entries for the
    /// removed blocks. The entry block is never removed. Returns the number
    /// of blocks removed.
    pub fn remove_blocks(&mut self, ids: &BTreeSet<BlockId>) -> usize {
        let doomed: BTreeSet<BlockId> = ids
            .iter()
            .copied()
            .filter(|&b| b != self.entry_block && self.block(b).is_some())
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let phis: Vec<InstrId> = self
            .instructions()
            .filter(|(_, instr)| instr.kind.is_phi() && !doomed.contains(&instr.parent))
            .map(|(id, _)| id)
            .collect();
        let mut instrs: BTreeSet<InstrId> = BTreeSet::new();
        for phi in phis {
            if self.drop_phi_incoming(phi, &doomed) {
                // No incoming value left: readers see undef.
                trace!("erasing phi {} with no incoming blocks left", phi);
                instrs.insert(phi);
            }
        }

        instrs.extend(
            self.blocks
                .iter()
                .filter(|b| doomed.contains(&b.id))
                .flat_map(|b| b.instructions.iter().copied()),
        );
        self.erase_instrs(&instrs);

        let before = self.blocks.len();
        self.blocks.retain(|b| !doomed.contains(&b.id));
        before - self.blocks.len()
    }

    /// Checks that every operand edge is mirrored in the provider's use-list
    /// and vice versa.
    pub fn verify_use_lists(&self) -> Result<()> {
        for (id, instr) in self.instructions() {
            for dep in instr.instr_operands() {
                let Some(dep_slot) = self.slot(dep) else {
                    bail!("function @{}: {} reads erased instruction {}", self.name, id, dep);
                };
                if !dep_slot.users.contains(&id) {
                    bail!("function @{}: {} missing from use-list of {}", self.name, id, dep);
                }
            }
        }
        for (id, slot) in self.slots() {
            for &user in &slot.users {
                let reads = self
                    .instr(user)
                    .is_some_and(|u| u.instr_operands().any(|dep| dep == id));
                if !reads {
                    bail!("function @{}: stale user {} in use-list of {}", self.name, user, id);
                }
            }
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn slot(&self, id: InstrId) -> Option<&InstrSlot> {
        self.instrs.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: InstrId) -> Option<&mut InstrSlot> {
        self.instrs.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn slots(&self) -> impl Iterator<Item = (InstrId, &InstrSlot)> + '_ {
        self.instrs
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|s| (InstrId(idx as u32), s)))
    }

    fn check_operands(&self, operands: &[Operand]) -> Result<()> {
        for dep in operands.iter().filter_map(Operand::as_instr) {
            if !self.contains_instr(dep) {
                bail!("function @{}: operand {} does not exist", self.name, dep);
            }
        }
        Ok(())
    }

    /// Swaps in a new operand list and moves `id` between use-lists.
    /// Operands must already be checked.
    fn relink(&mut self, id: InstrId, operands: Vec<Operand>) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut slot.instr.operands, operands);

        for dep in old.iter().filter_map(Operand::as_instr) {
            if let Some(dep_slot) = self.slot_mut(dep) {
                dep_slot.users.remove(&id);
            }
        }
        let new_deps: Vec<InstrId> = self
            .instr(id)
            .map(|instr| instr.instr_operands().collect())
            .unwrap_or_default();
        for dep in new_deps {
            if let Some(dep_slot) = self.slot_mut(dep) {
                dep_slot.users.insert(id);
            }
        }
    }

    /// Returns true if the phi is left without any incoming entry.
    fn drop_phi_incoming(&mut self, phi: InstrId, doomed: &BTreeSet<BlockId>) -> bool {
        let (incoming, operands): (Vec<BlockId>, Vec<Operand>) = {
            let Some(instr) = self.instr(phi) else {
                return false;
            };
            let InstrKind::Phi { incoming } = &instr.kind else {
                return false;
            };
            if !incoming.iter().any(|b| doomed.contains(b)) {
                return false;
            }
            incoming
                .iter()
                .zip(&instr.operands)
                .filter(|(b, _)| !doomed.contains(b))
                .map(|(b, op)| (*b, *op))
                .unzip()
        };
        let emptied = incoming.is_empty();
        if let Some(slot) = self.slot_mut(phi) {
            slot.instr.kind = InstrKind::Phi { incoming };
        }
        self.relink(phi, operands);
        emptied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOp;

    fn add(func: &mut Function, block: BlockId, lhs: Operand, rhs: Operand) -> InstrId {
        func.append_instr(block, InstrKind::Binary(BinOp::Add), vec![lhs, rhs])
            .unwrap()
    }

    #[test]
    fn first_block_is_entry() {
        let mut func = Function::new(FuncId(0), "f", 0);
        assert!(func.is_declaration());
        let b0 = func.add_block();
        let b1 = func.add_block();
        assert_eq!(func.entry_block(), b0);
        assert_ne!(b0, b1);
        assert!(!func.is_declaration());
    }

    #[test]
    fn use_lists_track_operands() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let a = add(&mut func, b0, Operand::int(1), Operand::int(2));
        let b = add(&mut func, b0, a.into(), a.into());
        let c = add(&mut func, b0, a.into(), b.into());

        assert_eq!(func.users(a).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(func.users(b).collect::<Vec<_>>(), vec![c]);
        assert!(!func.has_users(c));
        func.verify_use_lists().unwrap();

        func.set_operands(c, vec![Operand::int(0), Operand::int(0)])
            .unwrap();
        assert_eq!(func.users(a).collect::<Vec<_>>(), vec![b]);
        assert!(!func.has_users(b));
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn append_rejects_unknown_operand_and_block() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let err = func.append_instr(b0, InstrKind::Load, vec![Operand::Instr(InstrId(7))]);
        assert!(err.is_err());
        let err = func.append_instr(BlockId(9), InstrKind::Alloca, vec![]);
        assert!(err.is_err());
    }

    #[test]
    fn erase_detaches_from_operands() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let a = add(&mut func, b0, Operand::int(1), Operand::int(2));
        let b = add(&mut func, b0, a.into(), a.into());

        assert!(func.erase_instr(b));
        assert!(!func.contains_instr(b));
        assert!(!func.has_users(a));
        assert_eq!(func.block(b0).unwrap().instructions(), &[a]);
        assert!(!func.erase_instr(b));
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn erase_rewrites_surviving_users_to_undef() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let a = add(&mut func, b0, Operand::int(1), Operand::int(2));
        let b = add(&mut func, b0, a.into(), Operand::int(3));

        func.erase_instr(a);
        assert_eq!(
            func.instr(b).unwrap().operands,
            vec![Operand::Undef, Operand::int(3)]
        );
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn predecessors_include_self_loops() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        func.append_instr(b0, InstrKind::Br { target: b1 }, vec![])
            .unwrap();
        func.append_instr(
            b1,
            InstrKind::CondBr {
                if_true: b1,
                if_false: b0,
            },
            vec![Operand::int(1)],
        )
        .unwrap();
        func.append_instr(b2, InstrKind::Ret, vec![]).unwrap();

        let preds = func.predecessors();
        assert_eq!(preds[&b0], BTreeSet::from([b1]));
        assert_eq!(preds[&b1], BTreeSet::from([b0, b1]));
        assert!(preds[&b2].is_empty());
    }

    #[test]
    fn remove_blocks_prunes_phi_incoming() {
        // bb0: br bb2
        // bb1: %x = add 1, 2 ; br bb2     (to be removed)
        // bb2: %p = phi [0, bb0], [%x, bb1] ; ret %p
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        func.append_instr(b0, InstrKind::Br { target: b2 }, vec![])
            .unwrap();
        let x = add(&mut func, b1, Operand::int(1), Operand::int(2));
        func.append_instr(b1, InstrKind::Br { target: b2 }, vec![])
            .unwrap();
        let p = func
            .append_instr(
                b2,
                InstrKind::Phi {
                    incoming: vec![b0, b1],
                },
                vec![Operand::int(0), x.into()],
            )
            .unwrap();
        func.append_instr(b2, InstrKind::Ret, vec![p.into()])
            .unwrap();

        assert_eq!(func.remove_blocks(&BTreeSet::from([b1])), 1);
        let phi = func.instr(p).unwrap();
        assert_eq!(phi.kind, InstrKind::Phi { incoming: vec![b0] });
        assert_eq!(phi.operands, vec![Operand::int(0)]);
        assert!(!func.contains_instr(x));
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn phi_without_incoming_blocks_is_erased() {
        // bb0: br bb1
        // bb1: %p = phi [1, bb2] ; %q = add %p, 1 ; ret %q
        // bb2: br bb1     (to be removed)
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        func.append_instr(b0, InstrKind::Br { target: b1 }, vec![])
            .unwrap();
        let p = func
            .append_instr(b1, InstrKind::Phi { incoming: vec![b2] }, vec![Operand::int(1)])
            .unwrap();
        let q = add(&mut func, b1, p.into(), Operand::int(1));
        func.append_instr(b1, InstrKind::Ret, vec![q.into()])
            .unwrap();
        func.append_instr(b2, InstrKind::Br { target: b1 }, vec![])
            .unwrap();

        assert_eq!(func.remove_blocks(&BTreeSet::from([b2])), 1);
        assert!(!func.contains_instr(p));
        assert_eq!(func.instr(q).unwrap().operands, vec![Operand::Undef, Operand::int(1)]);
        func.verify_use_lists().unwrap();
    }

    #[test]
    fn entry_block_is_never_removed() {
        let mut func = Function::new(FuncId(0), "f", 0);
        let b0 = func.add_block();
        func.append_instr(b0, InstrKind::Ret, vec![]).unwrap();
        assert_eq!(func.remove_blocks(&BTreeSet::from([b0])), 0);
        assert_eq!(func.num_blocks(), 1);
        assert_eq!(func.num_instrs(), 1);
    }
}
