//! officebatch CLI - run batch scripts of Office-automation commands

use anyhow::Context;
use clap::Parser;
use officebatch::cli::{Args, SubCommand};
use officebatch::script::{check_file, explain_script, has_errors, ScriptRunner, ValidationOptions};
use officebatch::{format_output, ExecutionContext, OutputFormat, ProcessDispatcher};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default = if verbose { "officebatch=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns whether the command succeeded
fn run(args: Args) -> anyhow::Result<bool> {
    let output_format = if args.json { OutputFormat::Json } else { OutputFormat::Human };

    match args.command {
        SubCommand::Run {
            file,
            vars,
            continue_on_error,
            log_file,
            program,
            max_loop_iterations,
        } => {
            let ctx = ExecutionContext {
                dry_run: args.dry_run,
                verbose: args.verbose,
                continue_on_error,
                max_loop_iterations,
                output_format,
            };

            let mut dispatcher = ProcessDispatcher::new();
            if let Some(program) = program {
                dispatcher = dispatcher.with_program(program);
            }

            let mut runner = ScriptRunner::new(ctx)
                .with_args(vars)
                .with_dispatcher(Box::new(dispatcher))
                .with_log_file(log_file);
            let result = runner
                .run_file(&file)
                .with_context(|| format!("failed to run {}", file.display()))?;

            println!("{}", format_output(&result, &output_format));
            if args.verbose && output_format == OutputFormat::Human {
                println!("\n{}", runner.variables().display());
            }
            Ok(result.success)
        }

        SubCommand::Check { file } => {
            let (script, diagnostics) = check_file(&file, &ValidationOptions::default())
                .with_context(|| format!("failed to read {}", file.display()))?;
            let failed = has_errors(&diagnostics);

            if output_format == OutputFormat::Json {
                let report = serde_json::json!({
                    "script": file.display().to_string(),
                    "lines": script.len(),
                    "valid": !failed,
                    "diagnostics": diagnostics,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(!failed);
            }

            println!("Script: {}", file.display());
            println!("Lines:  {}\n", script.len());
            if !failed {
                for entry in explain_script(&script)? {
                    println!("{}", entry);
                }
            }
            if !diagnostics.is_empty() {
                println!("\nDiagnostics:");
                for diagnostic in &diagnostics {
                    println!("  - {}", diagnostic);
                }
            }
            if !failed {
                println!("\nOK");
            }
            Ok(!failed)
        }
    }
}
