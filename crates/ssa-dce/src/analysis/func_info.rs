//! Per-function side-effect classification.
//!
//! ## Algorithm
//!
//! 1. Classify each function by its own instructions: a store makes it
//!    side-effecting, a load makes it at least read-only, and an external
//!    declaration is side-effecting because its body is unknown.
//! 2. Build the reverse call graph (`callee → callers`).
//! 3. Propagate: a caller is at least as effectful as any of its callees.
//!    Worklist over callees whose class rose; classes only move up the
//!    `Pure < ReadOnly < SideEffecting` chain, so this terminates even with
//!    recursive call cycles.

use crate::ir::{FuncId, InstrKind, Module};
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::debug;

/// Side-effect class of a function, ordered from least to most effectful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Purity {
    /// Neither reads nor writes memory.
    Pure,
    /// May read memory, never writes it.
    ReadOnly,
    /// May write memory or do anything an unknown function can.
    SideEffecting,
}

/// Result of the side-effect analysis for a whole module.
#[derive(Debug, Clone, Default)]
pub struct FuncInfo {
    purity: HashMap<FuncId, Purity>,
}

impl FuncInfo {
    pub fn analyze(module: &Module) -> Self {
        let mut purity: HashMap<FuncId, Purity> = HashMap::new();
        let mut callers: HashMap<FuncId, BTreeSet<FuncId>> = HashMap::new();

        for func in module.functions() {
            let mut class = if func.is_declaration() {
                Purity::SideEffecting
            } else {
                Purity::Pure
            };
            for (_, instr) in func.instructions() {
                match instr.kind {
                    InstrKind::Store => class = class.max(Purity::SideEffecting),
                    InstrKind::Load => class = class.max(Purity::ReadOnly),
                    InstrKind::Call { callee } => {
                        callers.entry(callee).or_default().insert(func.id);
                    }
                    _ => {}
                }
            }
            purity.insert(func.id, class);
        }

        let mut worklist: VecDeque<FuncId> = module
            .functions()
            .iter()
            .map(|f| f.id)
            .filter(|id| purity.get(id) != Some(&Purity::Pure))
            .collect();

        while let Some(callee) = worklist.pop_front() {
            let class = purity
                .get(&callee)
                .copied()
                .unwrap_or(Purity::SideEffecting);
            for &caller in callers.get(&callee).into_iter().flatten() {
                let entry = purity.entry(caller).or_insert(Purity::Pure);
                if class > *entry {
                    *entry = class;
                    worklist.push_back(caller);
                }
            }
        }

        let info = Self { purity };
        debug!(
            "func_info: {} pure, {} read-only, {} side-effecting",
            info.count(Purity::Pure),
            info.count(Purity::ReadOnly),
            info.count(Purity::SideEffecting)
        );
        info
    }

    /// Class of `func`; unknown functions are side-effecting.
    pub fn purity(&self, func: FuncId) -> Purity {
        self.purity
            .get(&func)
            .copied()
            .unwrap_or(Purity::SideEffecting)
    }

    pub fn is_pure(&self, func: FuncId) -> bool {
        self.purity(func) == Purity::Pure
    }

    /// Number of analyzed functions in `class`.
    pub fn count(&self, class: Purity) -> usize {
        self.purity.values().filter(|&&p| p == class).count()
    }
}
