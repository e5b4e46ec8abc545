//! Pruning of blocks that can never execute.
//!
//! The default strategy removes every non-entry block whose predecessor set
//! is empty; cascades (a block whose
//! only predecessor was just removed) are picked up by the next driver
//! iteration. The reachability strategy additionally removes unreachable
//! cycles, which never lose their predecessors.

use crate::ir::{BlockId, Function};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// How unreachable blocks are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockPruning {
    /// Remove non-entry blocks with no predecessors.
    #[default]
    NoPredecessors,
    /// Remove every block not reachable from the entry block.
    Reachability,
}

/// Non-entry blocks with an empty predecessor set, computed once.
fn blocks_without_predecessors(func: &Function) -> BTreeSet<BlockId> {
    let preds = func.predecessors();
    func.blocks()
        .iter()
        .map(|b| b.id)
        .filter(|&id| id != func.entry_block())
        .filter(|id| preds.get(id).map_or(true, |p| p.is_empty()))
        .collect()
}

/// Blocks some path from the entry block can reach.
fn reachable_blocks(func: &Function) -> HashSet<BlockId> {
    let mut seen = HashSet::new();
    let mut stack = vec![func.entry_block()];
    while let Some(block) = stack.pop() {
        if seen.insert(block) {
            stack.extend(func.successors(block));
        }
    }
    seen
}

/// Prunes the blocks `strategy` considers dead and reports how many went.
/// Declarations have no blocks and are left alone.
pub fn eliminate(func: &mut Function, strategy: BlockPruning) -> usize {
    if func.is_declaration() {
        return 0;
    }
    let dead: BTreeSet<BlockId> = match strategy {
        BlockPruning::NoPredecessors => blocks_without_predecessors(func),
        BlockPruning::Reachability => {
            let reachable = reachable_blocks(func);
            func.blocks()
                .iter()
                .map(|b| b.id)
                .filter(|id| !reachable.contains(id))
                .collect()
        }
    };
    if dead.is_empty() {
        return 0;
    }
    debug!("@{}: removing unreachable blocks {:?}", func.name, dead);
    func.remove_blocks(&dead)
}
