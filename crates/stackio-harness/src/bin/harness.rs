//! CLI entrypoint for the stackio conformance harness.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Conformance tooling for stackio.
#[derive(Debug, Parser)]
#[command(name = "stackio-harness")]
#[command(about = "Pipeline scenario runner for stackio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scenario suite and report results.
    Run {
        /// Only run scenarios whose name contains this substring.
        #[arg(long, default_value = "")]
        filter: String,
        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the scenario names without running them.
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { filter, output } => {
            let report = stackio_harness::run_filtered(&filter);
            let emitted = match output {
                Some(path) => report.write_json(&path),
                None => report.to_json().map(|json| println!("{json}")),
            };
            if let Err(e) = emitted {
                eprintln!("cannot emit report: {e}");
                return ExitCode::FAILURE;
            }
            eprintln!("{}/{} scenarios passed", report.passed, report.total);
            if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::List => {
            for scenario in stackio_harness::all_scenarios() {
                println!("{}\t{}", scenario.name, scenario.section);
            }
            ExitCode::SUCCESS
        }
    }
}
