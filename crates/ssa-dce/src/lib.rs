//! ssa-dce — dead code elimination for a small SSA intermediate representation.
//!
//! This crate provides the IR, a textual format for it, and a fixed-point
//! mark-and-sweep pass that removes unused instructions and unreachable
//! blocks, then reports functions and globals the entry point never uses.

pub mod analysis;
pub mod ir;
pub mod optimizer;
pub mod parser;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use optimizer::{run, BlockPruning, DceOptions, DceReport};
pub use parser::parse_module;

/// Optimize a module given in textual form.
///
/// Parses `source`, runs the pass with `options` and returns the printed
/// result together with the pass report.
///
/// # Example
/// ```
/// use ssa_dce::{optimize_source, DceOptions};
///
/// let src = "func @main(0) {\nbb0:\n  %x = add 1, 2\n  ret\n}\n";
/// let (out, report) = optimize_source(src, &DceOptions::default()).unwrap();
/// assert_eq!(report.instrs_removed, 1);
/// assert!(!out.contains("add"));
/// ```
pub fn optimize_source(source: &str, options: &DceOptions) -> Result<(String, DceReport)> {
    let mut module = parse_module(source).context("failed to parse IR module")?;
    let report = run(&mut module, options).context("dead code elimination failed")?;
    Ok((module.to_string(), report))
}
