//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "officebatch")]
#[command(author, version, about = "Run batch scripts of Office-automation commands", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Show the resolved lines without dispatching anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Run a batch script file
    Run {
        /// Path to the script file
        file: PathBuf,

        /// Initial script variables in the form KEY=VALUE
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Keep going after a failing line unless the script says otherwise
        #[arg(long)]
        continue_on_error: bool,

        /// Write a plain-text execution log to this file
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Automation CLI that every command line is passed to
        #[arg(long = "cli", env = "OFFICEBATCH_CLI", value_name = "PROGRAM")]
        program: Option<PathBuf>,

        /// Upper bound on @while iterations
        #[arg(long, default_value_t = 10_000)]
        max_loop_iterations: usize,
    },

    /// Check a script for structural errors without running it
    Check {
        /// Path to the script file
        file: PathBuf,
    },
}
