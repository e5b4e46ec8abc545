use anyhow::{Context, Result};
use clap::Parser;
use ssa_dce::{optimize_source, BlockPruning, DceOptions};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ssa-dce — dead code elimination for textual SSA IR.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input IR file
    input: PathBuf,

    /// Output IR file (stdout if omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Entry-point function used to find unused functions and globals
    #[arg(long, default_value = "main")]
    entry: String,

    /// Delete unused functions and globals instead of only reporting them
    #[arg(long)]
    remove_dead_symbols: bool,

    /// Prune every block unreachable from the entry block, including cycles
    #[arg(long)]
    prune_unreachable_cycles: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> DceOptions {
        DceOptions {
            entry_point: self.entry.clone(),
            block_pruning: if self.prune_unreachable_cycles {
                BlockPruning::Reachability
            } else {
                BlockPruning::NoPredecessors
            },
            remove_dead_symbols: self.remove_dead_symbols,
        }
    }
}

/// RUST_LOG wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let (optimized, report) = optimize_source(&source, &cli.options())
        .with_context(|| format!("failed to optimize {}", cli.input.display()))?;

    if let Some(output_path) = &cli.output {
        fs::write(output_path, &optimized)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
    } else {
        print!("{}", optimized);
    }

    eprintln!(
        "ssa-dce: removed {} instructions and {} blocks in {} iterations; {} unused functions, {} unused globals{}",
        report.instrs_removed,
        report.blocks_removed,
        report.iterations,
        report.unused_functions.len(),
        report.unused_globals.len(),
        if report.symbols_removed { " (removed)" } else { "" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["ssa-dce", "input.ir"]);
        assert_eq!(cli.input, PathBuf::from("input.ir"));
        assert!(cli.output.is_none());
        assert_eq!(cli.entry, "main");
        assert_eq!(cli.verbose, 0);

        let options = cli.options();
        assert_eq!(options.block_pruning, BlockPruning::NoPredecessors);
        assert!(!options.remove_dead_symbols);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "ssa-dce",
            "input.ir",
            "-o",
            "out.ir",
            "--entry",
            "start",
            "--remove-dead-symbols",
            "--prune-unreachable-cycles",
            "-vv",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("out.ir")));
        assert_eq!(cli.verbose, 2);

        let options = cli.options();
        assert_eq!(options.entry_point, "start");
        assert_eq!(options.block_pruning, BlockPruning::Reachability);
        assert!(options.remove_dead_symbols);
    }
}
