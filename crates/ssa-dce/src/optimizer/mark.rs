//! Liveness marking.
//!
//! Computes the smallest instruction set that contains every critical
//! instruction and is closed under "operand of a live instruction".
//!
//! ## Algorithm
//!
//! 1. Walk the function in program order; mark and enqueue every critical
//!    instruction.
//! 2. Drain the FIFO worklist: for each instruction operand of the dequeued
//!    instruction that is not yet live, mark it and enqueue it.
//!
//! Each instruction is enqueued at most once, so the walk is linear in the
//! number of def-use edges.

use super::critical::is_critical;
use crate::ir::{Function, InstrId};
use std::collections::{HashSet, VecDeque};

/// Live instruction set of one function, as of the last [`mark`].
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    live: HashSet<InstrId>,
}

impl Liveness {
    pub fn is_live(&self, id: InstrId) -> bool {
        self.live.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = InstrId> + '_ {
        self.live.iter().copied()
    }
}

/// Marks every instruction of `func` that a critical instruction depends on.
pub fn mark(func: &Function) -> Liveness {
    let mut live: HashSet<InstrId> = HashSet::new();
    let mut worklist: VecDeque<InstrId> = VecDeque::new();

    for (id, instr) in func.instructions() {
        if is_critical(instr) && live.insert(id) {
            worklist.push_back(id);
        }
    }

    while let Some(id) = worklist.pop_front() {
        let Some(instr) = func.instr(id) else {
            continue;
        };
        for dep in instr.instr_operands() {
            if live.insert(dep) {
                worklist.push_back(dep);
            }
        }
    }

    Liveness { live }
}
