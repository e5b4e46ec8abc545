//! Dead code elimination.
//!
//! Liveness-based mark-and-sweep over the IR, run per function to a fixed
//! point and followed by a module-level scan for unused symbols.
//!
//! Each optimization step is a self-contained sub-module. The top-level
//! [`run`] function drives them:
//!
//! ```text
//! repeat
//!     for each function: dead_blocks → mark → sweep
//! until no function changed
//! dead_symbols::scan (and optionally remove)
//! ```
//!
//! Every step only deletes, so the instruction and block counts shrink
//! monotonically and the loop terminates.

use crate::analysis::{FuncInfo, Purity};
use crate::ir::{Function, InstrKind, Module};
use anyhow::{Context, Result};
use tracing::{debug, info};

// ── Passes ───────────────────────────────────────────────────────────────────
pub mod critical;
pub mod dead_blocks;
pub mod dead_symbols;
pub mod mark;
pub mod sweep;

pub use critical::is_critical;
pub use dead_blocks::BlockPruning;
pub use dead_symbols::DeadSymbols;
pub use mark::{mark, Liveness};
pub use sweep::sweep;

/// Configuration options for the pass.
#[derive(Debug, Clone)]
pub struct DceOptions {
    /// Name of the program's entry-point function; roots the unused-symbol scan.
    pub entry_point: String,
    /// How unreachable blocks are detected.
    pub block_pruning: BlockPruning,
    /// Delete unused functions and globals instead of only reporting them.
    pub remove_dead_symbols: bool,
}

impl Default for DceOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_string(),
            block_pruning: BlockPruning::default(),
            remove_dead_symbols: false,
        }
    }
}

/// What one invocation of [`run`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DceReport {
    /// Outer iterations, including the final one that changed nothing.
    pub iterations: usize,
    pub instrs_removed: usize,
    pub blocks_removed: usize,
    /// Functions not reachable from the entry point.
    pub unused_functions: Vec<String>,
    /// Globals not referenced by any reachable function.
    pub unused_globals: Vec<String>,
    /// Whether the unused symbols above were deleted from the module.
    pub symbols_removed: bool,
    pub pure_functions: usize,
    pub readonly_functions: usize,
    /// Calls to pure functions whose result nothing reads. They stay because
    /// calls are critical.
    pub pure_calls_kept: usize,
}

impl DceReport {
    /// True if the module was modified.
    pub fn changed(&self) -> bool {
        self.instrs_removed > 0
            || self.blocks_removed > 0
            || (self.symbols_removed
                && !(self.unused_functions.is_empty() && self.unused_globals.is_empty()))
    }
}

/// Changes made to one function by a single prune → mark → sweep round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub blocks_removed: usize,
    pub instrs_removed: usize,
}

impl StepStats {
    pub fn changed(&self) -> bool {
        self.blocks_removed > 0 || self.instrs_removed > 0
    }
}

/// Runs one prune → mark → sweep round on a single function.
pub fn step(func: &mut Function, pruning: BlockPruning) -> StepStats {
    let blocks_removed = dead_blocks::eliminate(func, pruning);
    let liveness = mark(func);
    let instrs_removed = sweep(func, &liveness);
    StepStats {
        blocks_removed,
        instrs_removed,
    }
}

/// Counts surviving calls to pure functions whose result has no users.
fn unused_pure_calls(func: &Function, info: &FuncInfo) -> usize {
    func.instructions()
        .filter(|(id, instr)| match instr.kind {
            InstrKind::Call { callee } => info.is_pure(callee) && !func.has_users(*id),
            _ => false,
        })
        .count()
}

/// Runs dead code elimination over the whole module in place.
///
/// Fails only if the module is malformed (see [`Module::validate`]).
pub fn run(module: &mut Module, options: &DceOptions) -> Result<DceReport> {
    module
        .validate()
        .context("dead code elimination requires a well-formed module")?;

    let func_info = FuncInfo::analyze(module);
    let mut report = DceReport {
        pure_functions: func_info.count(Purity::Pure),
        readonly_functions: func_info.count(Purity::ReadOnly),
        ..Default::default()
    };

    loop {
        report.iterations += 1;
        let mut changed = false;

        for func in module.functions_mut() {
            let stats = step(func, options.block_pruning);
            if stats.changed() {
                debug!(
                    "iteration {}: @{} lost {} blocks and {} instructions",
                    report.iterations, func.name, stats.blocks_removed, stats.instrs_removed
                );
            }
            report.blocks_removed += stats.blocks_removed;
            report.instrs_removed += stats.instrs_removed;
            changed |= stats.changed();
        }

        if !changed {
            break;
        }
    }

    for func in module.functions() {
        let kept = unused_pure_calls(func, &func_info);
        if kept > 0 {
            debug!("@{}: keeping {} calls to pure functions with unused results", func.name, kept);
        }
        report.pure_calls_kept += kept;
    }

    let dead = dead_symbols::scan(module, &options.entry_point);
    report.unused_functions = dead.function_names(module);
    report.unused_globals = dead.global_names(module);
    if !dead.is_empty() {
        info!(
            "found {} unused functions and {} unused global variables",
            report.unused_functions.len(),
            report.unused_globals.len()
        );
        if options.remove_dead_symbols {
            let removed = dead_symbols::remove(module, &dead);
            debug!("removed {} unused symbols", removed);
            report.symbols_removed = true;
        }
    }

    info!(
        "dead code pass erased {} instructions and {} blocks in {} iterations",
        report.instrs_removed, report.blocks_removed, report.iterations
    );
    Ok(report)
}

// ── run integration tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn run_reaches_fixed_point_across_functions() {
        let mut module = parse_module(
            "
func @a(0) {
b0:
  %x = add 1, 2
  ret
b1:
  ret
}

func @main(0) {
b0:
  %r = call @a()
  ret
}
",
        )
        .unwrap();

        let report = run(&mut module, &DceOptions::default()).unwrap();
        assert_eq!(report.instrs_removed, 1);
        assert_eq!(report.blocks_removed, 1);
        // One changing iteration, one confirming the fixed point.
        assert_eq!(report.iterations, 2);
        assert!(report.changed());
        assert!(report.unused_functions.is_empty());
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut module = parse_module(
            "
func @main(1) {
b0:
  %c = icmp eq $0, 0
  %dead = mul $0, 3
  br %c, b1, b2
b1:
  ret
b2:
  ret
b3:
  %y = add %dead, 1
  br b1
}
",
        )
        .unwrap();
        let first = run(&mut module, &DceOptions::default()).unwrap();
        assert!(first.changed());
        let printed = module.to_string();

        let second = run(&mut module, &DceOptions::default()).unwrap();
        assert!(!second.changed());
        assert_eq!(second.iterations, 1);
        assert_eq!(module.to_string(), printed);
    }

    #[test]
    fn step_never_grows_a_function() {
        let module = parse_module(
            "
func @f(1) {
b0:
  %a = add $0, 1
  %b = mul %a, 2
  ret %a
b1:
  %c = sub %b, 1
  br b2
b2:
  %d = xor %c, %c
  br b3
b3:
  ret %d
}
",
        )
        .unwrap();
        let mut func = module.functions()[0].clone();

        let mut sizes = vec![(func.num_blocks(), func.num_instrs())];
        while step(&mut func, BlockPruning::NoPredecessors).changed() {
            sizes.push((func.num_blocks(), func.num_instrs()));
        }
        assert!(sizes.windows(2).all(|w| w[1].0 <= w[0].0 && w[1].1 <= w[0].1));
        assert_eq!(sizes.last(), Some(&(1, 2)));
        assert_eq!(func.entry_block(), crate::ir::BlockId(0));
    }

    #[test]
    fn malformed_module_is_rejected() {
        let mut module = Module::new();
        let f = module.add_function("main", 0).unwrap();
        let func = module.function_mut(f).unwrap();
        let b0 = func.add_block();
        func.append_instr(b0, crate::ir::InstrKind::Load, vec![])
            .unwrap();
        assert!(run(&mut module, &DceOptions::default()).is_err());
    }

    #[test]
    fn purity_counts_reported() {
        let mut module = parse_module(
            "
declare @ext(0)

func @pure(1) {
b0:
  %r = add $0, 1
  ret %r
}

func @main(0) {
b0:
  %p = alloca
  %v = load %p
  %unused = call @pure(%v)
  %used = call @pure(2)
  call @ext()
  ret %used
}
",
        )
        .unwrap();
        let report = run(&mut module, &DceOptions::default()).unwrap();
        assert_eq!(report.pure_functions, 1);
        assert_eq!(report.readonly_functions, 0);
        assert_eq!(report.pure_calls_kept, 1);
        assert!(report.unused_functions.is_empty());
        // The unused call is still there.
        let main = module.function_by_name("main").unwrap();
        let calls = main.instructions().filter(|(_, i)| i.kind.is_call()).count();
        assert_eq!(calls, 3);
    }
}
