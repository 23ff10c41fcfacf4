//! Script runner for executing batch files

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::{EnvironmentContext, VariableStore};
use crate::engine::dispatcher::{CommandDispatcher, ProcessDispatcher};
use crate::engine::executor::{
    display_command, ExecutionContext, Executor, Flow, LineResult, LOOP_INDEX_VAR,
};
use crate::error::{BatchError, Result};
use crate::output::write_execution_log;
use crate::parser::{parse_script, Directive, LineKind, Script, ScriptDiagnostic};
use crate::script::blocks::outline;
use crate::script::validator::{ensure_valid, validate_script, ValidationOptions};

/// Result of a whole batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// Script path or name
    pub script: String,
    /// No fatal error, no stoppage, no uncaught failure
    pub success: bool,
    pub executed_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Error that ended the run early, if any
    pub error: Option<String>,
    /// Every recorded line result, in execution order
    pub log: Vec<LineResult>,
}

/// Script runner that manages script execution
pub struct ScriptRunner {
    /// Execution context (dry_run, continue_on_error, etc.)
    exec_ctx: ExecutionContext,
    /// Script variables and the environment they fall back to
    variables: VariableStore,
    /// Variables injected before the first line runs
    initial_variables: Vec<(String, String)>,
    dispatcher: Box<dyn CommandDispatcher>,
    log_file: Option<PathBuf>,
    validation: ValidationOptions,
}

impl ScriptRunner {
    /// Create a runner that dispatches commands as child processes and
    /// exports into the process environment.
    pub fn new(exec_ctx: ExecutionContext) -> Self {
        Self {
            exec_ctx,
            variables: VariableStore::new(EnvironmentContext::process()),
            initial_variables: Vec::new(),
            dispatcher: Box::new(ProcessDispatcher::new()),
            log_file: None,
            validation: ValidationOptions::default(),
        }
    }

    /// Set script arguments given as `KEY=VALUE`
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        for arg in args {
            if let Some((key, value)) = arg.split_once('=') {
                self.initial_variables
                    .push((key.trim().to_string(), value.to_string()));
            } else {
                tracing::warn!(arg = %arg, "ignoring script argument without '='");
            }
        }
        self
    }

    /// Add initial variables
    pub fn with_variables(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.initial_variables.extend(vars);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn CommandDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replace the environment `@export` writes to
    pub fn with_environment(mut self, environment: EnvironmentContext) -> Self {
        self.variables = VariableStore::new(environment);
        self
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    pub fn with_validation(mut self, options: ValidationOptions) -> Self {
        self.validation = options;
        self
    }

    /// Variables as they stand after the last run
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Load and run a script file
    pub fn run_file(&mut self, path: &Path) -> Result<BatchResult> {
        let content = fs::read_to_string(path)?;
        let script = parse_script(&content);
        self.run_script(&script, &path.display().to_string())
    }

    /// Run a parsed script.
    ///
    /// Structural problems are returned as `Err` before any line runs.
    /// Once execution has started, every recorded line result is kept in
    /// the returned [`BatchResult`], even when the run stops early.
    pub fn run_script(&mut self, script: &Script, name: &str) -> Result<BatchResult> {
        let warnings = ensure_valid(script, &self.validation)?;
        for warning in &warnings {
            eprintln!("{}", warning);
        }

        for (key, value) in &self.initial_variables {
            self.variables.set(key, value.clone())?;
        }

        let started_at = Utc::now();
        let clock = Instant::now();

        let mut result = if self.exec_ctx.dry_run {
            let listing = dry_run_listing(script, &mut self.variables);
            for line in &listing {
                println!("{}", line);
            }
            BatchResult {
                script: name.to_string(),
                success: true,
                executed_count: 0,
                skipped_count: script.lines.len(),
                failed_count: 0,
                total_duration_ms: 0,
                started_at,
                finished_at: started_at,
                dry_run: true,
                error: None,
                log: Vec::new(),
            }
        } else {
            let mut executor = Executor::new(
                &script.lines,
                &mut self.variables,
                self.dispatcher.as_mut(),
                &self.exec_ctx,
            );
            let outcome = executor.run();
            let report = executor.finish();

            let failed_count = report.results.iter().filter(|r| !r.success).count();
            let (stopped, error) = match outcome {
                Ok(Flow::Completed) => (false, None),
                Ok(Flow::Stopped) => (true, None),
                Err(e) => (true, Some(e.to_string())),
            };
            if stopped {
                tracing::warn!(script = name, "run stopped early");
            }

            BatchResult {
                script: name.to_string(),
                success: !stopped && error.is_none() && report.uncaught_failures == 0,
                executed_count: report.results.len(),
                skipped_count: report.skipped,
                failed_count,
                total_duration_ms: 0,
                started_at,
                finished_at: started_at,
                dry_run: false,
                error,
                log: report.results,
            }
        };

        result.finished_at = Utc::now();
        result.total_duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(ref path) = self.log_file {
            write_execution_log(path, &result)?;
        }

        tracing::info!(
            script = name,
            success = result.success,
            executed = result.executed_count,
            failed = result.failed_count,
            "batch finished"
        );
        Ok(result)
    }
}

/// Resolved form of every executable line, without dispatching anything.
///
/// `@set`, `@unset` and `@export` are applied to `vars` as the listing goes
/// so later lines resolve the way they would at run time; nothing is
/// written to the process environment. Loop variables only get values at
/// run time, so inside a `@foreach` body their references are listed as
/// written.
pub fn dry_run_listing(script: &Script, vars: &mut VariableStore) -> Vec<String> {
    let mut listing = Vec::new();
    let mut loop_vars: Vec<String> = Vec::new();

    for line in &script.lines {
        let text = match line.kind {
            LineKind::Empty | LineKind::Comment => continue,
            LineKind::Command => {
                let args: Vec<String> = line
                    .args
                    .iter()
                    .map(|a| vars.resolve_except(a, &loop_vars))
                    .collect();
                display_command(&vars.resolve_except(&line.command, &loop_vars), &args)
            }
            LineKind::Directive => {
                let body = vars.resolve_except(line.directive_body(), &loop_vars);
                let mut text = if body.is_empty() {
                    format!("@{}", line.command)
                } else {
                    format!("@{} {}", line.command, body)
                };

                match Directive::parse(line) {
                    Ok(Directive::Set { name, value }) | Ok(Directive::Export { name, value }) => {
                        let value = vars.resolve_except(&value, &loop_vars);
                        if let Err(e) = vars.set(&name, value) {
                            tracing::warn!(line = line.line_number, error = %e, "dry run: variable not set");
                            text.push_str(&format!("    [would fail: {}]", e));
                        }
                    }
                    Ok(Directive::Unset { name }) => {
                        vars.unset(&name);
                    }
                    Ok(Directive::Foreach { var, .. }) => {
                        loop_vars.push(var);
                        loop_vars.push(LOOP_INDEX_VAR.to_string());
                    }
                    Ok(Directive::EndForeach) => {
                        loop_vars.truncate(loop_vars.len().saturating_sub(2));
                    }
                    _ => {}
                }
                text
            }
        };
        listing.push(format!("{:>4}: {}", line.line_number, text));
    }

    listing
}

/// Describe the block structure of a script, one entry per block.
///
/// Nested blocks are indented under the block that contains them.
pub fn explain_script(script: &Script) -> Result<Vec<String>> {
    let spans = outline(&script.lines)?;
    let mut explanations = Vec::with_capacity(spans.len());

    for span in &spans {
        let depth = spans
            .iter()
            .filter(|outer| outer.opener < span.opener && span.terminator < outer.terminator)
            .count();
        let opener = &script.lines[span.opener];
        let mut entry = format!(
            "{}{} lines {}-{}",
            "  ".repeat(depth),
            span.kind,
            opener.line_number,
            script.lines[span.terminator].line_number
        );
        let body = opener.directive_body();
        if !body.is_empty() {
            entry.push_str(&format!(": {}", body));
        }
        for &branch in &span.branches {
            let marker = &script.lines[branch];
            entry.push_str(&format!(", @{} at {}", marker.command, marker.line_number));
        }
        explanations.push(entry);
    }

    Ok(explanations)
}

/// Parse and validate a script file without running it
pub fn check_file(path: &Path, options: &ValidationOptions) -> Result<(Script, Vec<ScriptDiagnostic>)> {
    let content = fs::read_to_string(path)?;
    let script = parse_script(&content);
    let diagnostics = validate_script(&script, options);
    Ok((script, diagnostics))
}

/// Run a script file in one call.
///
/// `initial_variables` are set before the first line. `@export` writes into
/// the process environment and those values persist after this returns.
pub fn run(
    script_path: &Path,
    exec_ctx: ExecutionContext,
    log_file: Option<&Path>,
    initial_variables: &[(String, String)],
) -> Result<BatchResult> {
    if !script_path.exists() {
        return Err(BatchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("script not found: {}", script_path.display()),
        )));
    }
    let mut runner = ScriptRunner::new(exec_ctx)
        .with_variables(initial_variables.iter().cloned())
        .with_log_file(log_file.map(Path::to_path_buf));
    runner.run_file(script_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatcher::DispatchOutcome;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Shares its call list with the test after being boxed into the runner
    #[derive(Clone, Default)]
    struct SharedDispatcher {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl CommandDispatcher for SharedDispatcher {
        fn dispatch(&mut self, name: &str, args: &[String], _env: &EnvironmentContext) -> DispatchOutcome {
            self.calls.lock().unwrap().push(display_command(name, args));
            if name == "fail" {
                DispatchOutcome::failed("boom")
            } else {
                DispatchOutcome::ok("")
            }
        }
    }

    fn runner(ctx: ExecutionContext) -> (ScriptRunner, Arc<Mutex<Vec<String>>>) {
        let dispatcher = SharedDispatcher::default();
        let calls = dispatcher.calls.clone();
        let runner = ScriptRunner::new(ctx)
            .with_environment(EnvironmentContext::isolated())
            .with_dispatcher(Box::new(dispatcher));
        (runner, calls)
    }

    #[test]
    fn test_script_runner_with_args() {
        let (runner, _) = runner(ExecutionContext::default());
        let runner = runner.with_args(vec!["path=/tmp".to_string(), "threshold=80".to_string(), "bad".to_string()]);
        assert_eq!(
            runner.initial_variables,
            vec![
                ("path".to_string(), "/tmp".to_string()),
                ("threshold".to_string(), "80".to_string())
            ]
        );
    }

    #[test]
    fn test_run_counts() {
        let (mut runner, calls) = runner(ExecutionContext::default());
        let script = parse_script("# build\n@set X = 1\ncmd $X\n\ncmd done");
        let result = runner.run_script(&script, "counts").unwrap();
        assert!(result.success);
        assert_eq!(result.executed_count, 3);
        assert_eq!(result.skipped_count, 2);
        assert_eq!(result.failed_count, 0);
        assert_eq!(*calls.lock().unwrap(), vec!["cmd 1", "cmd done"]);
    }

    #[test]
    fn test_unclosed_if_runs_nothing() {
        let (mut runner, calls) = runner(ExecutionContext::default());
        let script = parse_script("cmd first\n@if true\ncmd second");
        let err = runner.run_script(&script, "broken").unwrap_err();
        assert!(matches!(err, BatchError::Parse { line: 2, .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_keeps_partial_results() {
        let (mut runner, calls) = runner(ExecutionContext::default());
        let script = parse_script("cmd 1\ncmd 2\ncmd 3\ncmd 4\nfail 5\ncmd 6");
        let result = runner.run_script(&script, "partial").unwrap();
        assert!(!result.success);
        assert_eq!(result.executed_count, 5);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.log.last().unwrap().line_number, 5);
        assert_eq!(calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_caught_failure_is_success() {
        let (mut runner, _) = runner(ExecutionContext::default());
        let script = parse_script("@try\nfail a\n@catch\ncmd b\n@endtry");
        let result = runner.run_script(&script, "caught").unwrap();
        assert!(result.success);
        assert_eq!(result.failed_count, 1);
    }

    #[test]
    fn test_initial_variables() {
        let (runner, calls) = runner(ExecutionContext::default());
        let mut runner = runner.with_variables(vec![("DEPT".to_string(), "finance".to_string())]);
        let script = parse_script("excel open ${DEPT}.xlsx");
        runner.run_script(&script, "vars").unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["excel open finance.xlsx"]);
    }

    #[test]
    fn test_invalid_initial_variable_is_error() {
        let (runner, _) = runner(ExecutionContext::default());
        let mut runner = runner.with_variables(vec![("bad-name".to_string(), "x".to_string())]);
        let err = runner.run_script(&parse_script("cmd"), "vars").unwrap_err();
        assert!(matches!(err, BatchError::Variable(_)));
    }

    #[test]
    fn test_dry_run_dispatches_nothing() {
        let ctx = ExecutionContext {
            dry_run: true,
            ..Default::default()
        };
        let (mut runner, calls) = runner(ctx);
        let script = parse_script("@set F = a.xlsx\nexcel open $F");
        let result = runner.run_script(&script, "dry").unwrap();
        assert!(result.dry_run);
        assert_eq!(result.executed_count, 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_listing_resolves() {
        let mut vars = VariableStore::isolated();
        let script = parse_script("@set F = a.xlsx\n# skip\nexcel open $F\n@if exists(\"$F\")\n@endif");
        let listing = dry_run_listing(&script, &mut vars);
        assert_eq!(
            listing,
            vec![
                "   1: @set F = a.xlsx",
                "   3: excel open a.xlsx",
                "   4: @if exists(\"a.xlsx\")",
                "   5: @endif"
            ]
        );
    }

    #[test]
    fn test_dry_run_listing_keeps_loop_references() {
        let mut vars = VariableStore::isolated();
        let script = parse_script(
            "@set DIR = /srv\n@foreach f in a.xlsx b.xlsx\nexcel open $DIR/$f --index ${__LOOP_INDEX__}\n@endforeach\ncmd $f",
        );
        let listing = dry_run_listing(&script, &mut vars);
        assert_eq!(listing[2], "   3: excel open /srv/$f --index ${__LOOP_INDEX__}");
        assert_eq!(listing[4], "   5: cmd \"\"");
    }

    #[test]
    fn test_dry_run_listing_flags_invalid_set() {
        let mut vars = VariableStore::isolated();
        let script = parse_script("@set 9lives = x\n@echo ok");
        let listing = dry_run_listing(&script, &mut vars);
        assert!(listing[0].starts_with("   1: @set 9lives = x    [would fail: Variable error"));
        assert_eq!(listing[1], "   2: @echo ok");
    }

    #[test]
    fn test_log_file_written_on_stop() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("run.log");
        let (runner, _) = runner(ExecutionContext::default());
        let mut runner = runner.with_log_file(Some(log.clone()));
        runner.run_script(&parse_script("cmd ok\nfail now\ncmd never"), "logged").unwrap();
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.contains("Script:   logged"));
        assert!(text.contains("[line 2] FAILED"));
        assert!(!text.contains("cmd never"));
    }

    #[test]
    fn test_run_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.batch");
        std::fs::write(&path, "@echo hi\n").unwrap();
        let (mut runner, _) = runner(ExecutionContext::default());
        let result = runner.run_file(&path).unwrap();
        assert!(result.success);
        assert_eq!(result.log[0].output, "hi");
        assert!(result.script.ends_with("job.batch"));
    }

    #[test]
    fn test_run_missing_file() {
        let err = run(Path::new("/definitely/not/here.batch"), ExecutionContext::default(), None, &[])
            .unwrap_err();
        assert!(matches!(err, BatchError::Io(_)));
    }

    #[test]
    fn test_explain_script_nesting() {
        let script = parse_script(
            "@foreach f in a b\n@try\nexcel open $f\n@catch\n@echo bad\n@endtry\n@endforeach\n@if x == \"1\"\n@else\n@endif",
        );
        let explained = explain_script(&script).unwrap();
        assert_eq!(
            explained,
            vec![
                "@foreach lines 1-7: f in a b",
                "  @try lines 2-6, @catch at 4",
                "@if lines 8-10: x == \"1\", @else at 9"
            ]
        );
    }

    #[test]
    fn test_check_file_reports_unbalanced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.batch");
        std::fs::write(&path, "@foreach x in a\ncmd $x\n").unwrap();
        let (_, diagnostics) = check_file(&path, &ValidationOptions::default()).unwrap();
        assert!(crate::script::validator::has_errors(&diagnostics));
    }
}
