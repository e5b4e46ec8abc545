//! Unused function and global detection.
//!
//! A function is unused when it cannot be reached from the entry-point
//! function over call edges. Reachability (rather than an empty call-site
//! list) also catches groups of dead functions that only call each other.
//! A global is unused when no instruction of a reachable function names it.
//!
//! Modules without an entry-point function are treated as libraries: every
//! function is a root and only globals can be reported.

use crate::ir::{FuncId, GlobalId, InstrKind, Module, Operand};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Symbols found unused by [`scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadSymbols {
    pub functions: BTreeSet<FuncId>,
    pub globals: BTreeSet<GlobalId>,
}

impl DeadSymbols {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.globals.is_empty()
    }

    pub fn function_names(&self, module: &Module) -> Vec<String> {
        self.functions
            .iter()
            .filter_map(|&id| module.function(id))
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn global_names(&self, module: &Module) -> Vec<String> {
        self.globals
            .iter()
            .filter_map(|&id| module.global(id))
            .map(|g| g.name.clone())
            .collect()
    }
}

/// Functions reachable from `roots` over call edges.
fn reachable_functions(module: &Module, roots: Vec<FuncId>) -> HashSet<FuncId> {
    let mut reachable = HashSet::new();
    let mut worklist = roots;

    while let Some(id) = worklist.pop() {
        if !reachable.insert(id) {
            continue;
        }
        let Some(func) = module.function(id) else {
            continue;
        };
        for (_, instr) in func.instructions() {
            if let InstrKind::Call { callee } = instr.kind {
                worklist.push(callee);
            }
        }
    }
    reachable
}

/// Finds functions and globals that nothing reachable from `entry_point` uses.
pub fn scan(module: &Module, entry_point: &str) -> DeadSymbols {
    let roots: Vec<FuncId> = match module.function_by_name(entry_point) {
        Some(entry) => vec![entry.id],
        None => {
            warn!(
                "entry point @{} not found; treating every function as a root",
                entry_point
            );
            module.functions().iter().map(|f| f.id).collect()
        }
    };
    let reachable = reachable_functions(module, roots);

    let mut used_globals: HashSet<GlobalId> = HashSet::new();
    for func in module.functions().iter().filter(|f| reachable.contains(&f.id)) {
        for (_, instr) in func.instructions() {
            for op in &instr.operands {
                if let Operand::Global(g) = op {
                    used_globals.insert(*g);
                }
            }
        }
    }

    DeadSymbols {
        functions: module
            .functions()
            .iter()
            .map(|f| f.id)
            .filter(|id| !reachable.contains(id))
            .collect(),
        globals: module
            .globals()
            .iter()
            .map(|g| g.id)
            .filter(|id| !used_globals.contains(id))
            .collect(),
    }
}

/// Deletes the given symbols from the module. Returns how many were removed.
///
/// Safe for any result of [`scan`]: every call site of a dead function lives
/// in another dead function, and dead globals are only named by dead
/// functions, so nothing left behind refers to a removed symbol.
pub fn remove(module: &mut Module, dead: &DeadSymbols) -> usize {
    module.remove_functions(&dead.functions) + module.remove_globals(&dead.globals)
}
