//! Recursive script executor
//!
//! The executor walks a half-open range `[start, end)` of the flat line
//! arena with a cursor. Block directives are matched on demand and their
//! bodies executed by recursing into sub-ranges; there is no block tree.

use std::time::Instant;

use serde::Serialize;

use crate::context::{is_valid_identifier, VariableStore};
use crate::engine::condition::ConditionEvaluator;
use crate::engine::dispatcher::CommandDispatcher;
use crate::error::{BatchError, Result};
use crate::output::human::format_line_result;
use crate::output::OutputFormat;
use crate::parser::{strip_quotes, Directive, ErrorPolicy, LineKind, ScriptLine};
use crate::script::blocks::find_block;

/// Synthetic 0-based iteration counter bound inside `@foreach` bodies
pub const LOOP_INDEX_VAR: &str = "__LOOP_INDEX__";

/// Execution context containing runtime configuration
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Parse and print resolved lines without dispatching anything
    pub dry_run: bool,
    /// Print every line result as it is recorded
    pub verbose: bool,
    /// Initial continue-on-error policy for the top-level range
    pub continue_on_error: bool,
    /// Upper bound on `@while` iterations
    pub max_loop_iterations: usize,
    pub output_format: OutputFormat,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            continue_on_error: false,
            max_loop_iterations: 10_000,
            output_format: OutputFormat::Human,
        }
    }
}

/// Record of one executed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineResult {
    pub line_number: usize,
    pub command_text: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// How a range finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Completed,
    /// A failure under the abort policy ended the range early
    Stopped,
}

/// Everything the executor collected during a run
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub results: Vec<LineResult>,
    /// Comment and blank lines passed over
    pub skipped: usize,
    /// Failures not covered by a `@try ... @catch`
    pub uncaught_failures: usize,
}

/// Interpreter over a parsed line arena
pub struct Executor<'a> {
    lines: &'a [ScriptLine],
    vars: &'a mut VariableStore,
    dispatcher: &'a mut dyn CommandDispatcher,
    ctx: &'a ExecutionContext,
    report: ExecutionReport,
    failures: usize,
    catch_depth: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        lines: &'a [ScriptLine],
        vars: &'a mut VariableStore,
        dispatcher: &'a mut dyn CommandDispatcher,
        ctx: &'a ExecutionContext,
    ) -> Self {
        Self {
            lines,
            vars,
            dispatcher,
            ctx,
            report: ExecutionReport::default(),
            failures: 0,
            catch_depth: 0,
        }
    }

    /// Execute every line
    pub fn run(&mut self) -> Result<Flow> {
        let policy = ErrorPolicy::from_flag(self.ctx.continue_on_error);
        self.execute_range(0, self.lines.len(), policy)
    }

    /// Results recorded so far
    pub fn results(&self) -> &[LineResult] {
        &self.report.results
    }

    /// Consume the executor, keeping what it collected even after an error
    pub fn finish(self) -> ExecutionReport {
        self.report
    }

    /// Execute `[start, end)` under `policy`.
    ///
    /// `@onerror` changes the policy for the rest of this range and for
    /// the ranges it enters, never for the caller.
    pub fn execute_range(&mut self, start: usize, end: usize, policy: ErrorPolicy) -> Result<Flow> {
        let lines = self.lines;
        let end = end.min(lines.len());
        let mut policy = policy;
        let mut i = start;

        while i < end {
            let line = &lines[i];
            match line.kind {
                LineKind::Empty | LineKind::Comment => {
                    self.report.skipped += 1;
                    i += 1;
                }
                LineKind::Command => {
                    let ok = self.execute_command(line);
                    if !ok && !policy.continues() {
                        return Ok(Flow::Stopped);
                    }
                    i += 1;
                }
                LineKind::Directive => {
                    let (next, flow) = match Directive::parse(line)? {
                        Directive::If { condition } => self.execute_if(i, end, &condition, policy)?,
                        Directive::Foreach { var, list } => {
                            self.execute_foreach(i, end, &var, &list, policy)?
                        }
                        Directive::While { condition } => {
                            self.execute_while(i, end, &condition, policy)?
                        }
                        Directive::Try => self.execute_try(i, end, policy)?,
                        Directive::OnError(new_policy) => {
                            tracing::debug!(line = line.line_number, %new_policy, "error policy changed");
                            policy = new_policy;
                            self.record(line, line.text().to_string(), Ok(String::new()), Instant::now());
                            (i + 1, Flow::Completed)
                        }
                        directive @ (Directive::Set { .. }
                        | Directive::Unset { .. }
                        | Directive::Echo { .. }
                        | Directive::Export { .. }) => {
                            let ok = self.execute_variable_directive(line, directive);
                            (i + 1, failure_flow(ok, policy))
                        }
                        // Branch markers and terminators only mean something
                        // to the block matcher
                        Directive::Elif { .. }
                        | Directive::Else
                        | Directive::EndIf
                        | Directive::EndForeach
                        | Directive::EndWhile
                        | Directive::Catch
                        | Directive::Finally
                        | Directive::EndTry => (i + 1, Flow::Completed),
                    };
                    if flow == Flow::Stopped {
                        return Ok(Flow::Stopped);
                    }
                    i = next;
                }
            }
        }

        Ok(Flow::Completed)
    }

    fn execute_if(
        &mut self,
        opener: usize,
        end: usize,
        condition: &str,
        policy: ErrorPolicy,
    ) -> Result<(usize, Flow)> {
        let lines = self.lines;
        let span = find_block(lines, opener, end)?;
        let next = span.terminator + 1;

        let mut chosen = match self.evaluate(condition) {
            Ok(true) => Some((opener + 1, span.segment_end(opener))),
            Ok(false) => None,
            Err(e) => return Ok((next, self.fail_construct(&lines[opener], e, policy))),
        };

        if chosen.is_none() {
            for &branch in &span.branches {
                let branch_line = &lines[branch];
                match Directive::parse(branch_line)? {
                    Directive::Elif { condition } => match self.evaluate(&condition) {
                        Ok(true) => {
                            chosen = Some((branch + 1, span.segment_end(branch)));
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => return Ok((next, self.fail_construct(branch_line, e, policy))),
                    },
                    Directive::Else => {
                        chosen = Some((branch + 1, span.segment_end(branch)));
                        break;
                    }
                    _ => {}
                }
            }
        }

        let flow = match chosen {
            Some((start, stop)) => propagate(self.execute_range(start, stop, policy)?, policy),
            None => Flow::Completed,
        };
        Ok((next, flow))
    }

    fn execute_foreach(
        &mut self,
        opener: usize,
        end: usize,
        var: &str,
        list: &str,
        policy: ErrorPolicy,
    ) -> Result<(usize, Flow)> {
        let lines = self.lines;
        let span = find_block(lines, opener, end)?;
        let next = span.terminator + 1;

        if !is_valid_identifier(var) {
            let err = BatchError::Variable(format!("invalid loop variable name '{}'", var));
            return Ok((next, self.fail_construct(&lines[opener], err, policy)));
        }

        let items = expand_list(&self.vars.resolve(list));
        tracing::debug!(line = lines[opener].line_number, var, count = items.len(), "foreach");

        let saved_var = self.vars.lookup(var).map(str::to_string);
        let saved_index = self.vars.lookup(LOOP_INDEX_VAR).map(str::to_string);

        let mut outcome = Ok(Flow::Completed);
        for (index, item) in items.into_iter().enumerate() {
            let bound = self
                .vars
                .set(var, item)
                .and_then(|_| self.vars.set(LOOP_INDEX_VAR, index.to_string()));
            if let Err(e) = bound {
                outcome = Err(e);
                break;
            }
            match self.execute_range(opener + 1, span.terminator, policy) {
                Ok(Flow::Stopped) if !policy.continues() => {
                    outcome = Ok(Flow::Stopped);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        // Loop bindings never outlive the loop, whatever happened inside
        self.restore(var, saved_var);
        self.restore(LOOP_INDEX_VAR, saved_index);

        outcome.map(|flow| (next, flow))
    }

    fn execute_while(
        &mut self,
        opener: usize,
        end: usize,
        condition: &str,
        policy: ErrorPolicy,
    ) -> Result<(usize, Flow)> {
        let lines = self.lines;
        let span = find_block(lines, opener, end)?;
        let next = span.terminator + 1;
        let mut iterations = 0usize;

        loop {
            match self.evaluate(condition) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Ok((next, self.fail_construct(&lines[opener], e, policy))),
            }

            iterations += 1;
            if iterations > self.ctx.max_loop_iterations {
                let err = BatchError::Evaluation(format!(
                    "@while loop exceeded {} iterations",
                    self.ctx.max_loop_iterations
                ));
                return Ok((next, self.fail_construct(&lines[opener], err, policy)));
            }

            let flow = self.execute_range(opener + 1, span.terminator, policy)?;
            if propagate(flow, policy) == Flow::Stopped {
                return Ok((next, Flow::Stopped));
            }
        }

        tracing::debug!(line = lines[opener].line_number, iterations, "while loop finished");
        Ok((next, Flow::Completed))
    }

    fn execute_try(&mut self, opener: usize, end: usize, policy: ErrorPolicy) -> Result<(usize, Flow)> {
        let lines = self.lines;
        let span = find_block(lines, opener, end)?;
        let catch = span.branch(lines, "catch");
        let finally = span.branch(lines, "finally");

        let failures_before = self.failures;
        if catch.is_some() {
            self.catch_depth += 1;
        }
        // One failing line must not abort the rest of the try body
        let body = self.execute_range(opener + 1, span.segment_end(opener), ErrorPolicy::Continue);
        if catch.is_some() {
            self.catch_depth -= 1;
        }
        body?;

        let failed = self.failures > failures_before;
        let mut flow = Flow::Completed;

        if failed {
            match catch {
                Some(marker) => {
                    tracing::info!(line = lines[marker].line_number, "running @catch");
                    let caught = self.execute_range(marker + 1, span.segment_end(marker), policy)?;
                    flow = propagate(caught, policy);
                }
                None if !policy.continues() => flow = Flow::Stopped,
                None => {}
            }
        }

        if let Some(marker) = finally {
            let cleanup = self.execute_range(marker + 1, span.segment_end(marker), policy)?;
            if propagate(cleanup, policy) == Flow::Stopped {
                flow = Flow::Stopped;
            }
        }

        Ok((span.terminator + 1, flow))
    }

    fn execute_variable_directive(&mut self, line: &ScriptLine, directive: Directive) -> bool {
        let started = Instant::now();
        let outcome = match directive {
            Directive::Set { name, value } => {
                let value = self.vars.resolve(&value);
                self.vars.set(&name, value).map(|_| String::new())
            }
            Directive::Export { name, value } => {
                let value = self.vars.resolve(&value);
                self.vars.export(&name, value).map(|_| String::new())
            }
            Directive::Unset { name } => {
                if is_valid_identifier(&name) {
                    self.vars.unset(&name);
                    Ok(String::new())
                } else {
                    Err(BatchError::Variable(format!("invalid variable name '{}'", name)))
                }
            }
            Directive::Echo { text } => {
                let text = self.vars.resolve(&text);
                // stdout carries the serialized result in JSON mode
                match self.ctx.output_format {
                    OutputFormat::Human => println!("{}", text),
                    OutputFormat::Json => eprintln!("{}", text),
                }
                Ok(text)
            }
            _ => Ok(String::new()),
        };
        self.record(line, line.text().to_string(), outcome, started)
    }

    fn execute_command(&mut self, line: &ScriptLine) -> bool {
        let name = self.vars.resolve(&line.command);
        let args: Vec<String> = line.args.iter().map(|a| self.vars.resolve(a)).collect();
        let command_text = display_command(&name, &args);

        if name.trim().is_empty() {
            let err = BatchError::Command(format!("command name resolved to nothing: {}", line.text()));
            return self.record(line, command_text, Err(err), Instant::now());
        }

        tracing::debug!(line = line.line_number, command = %command_text, "dispatching");
        let started = Instant::now();
        let outcome = self.dispatcher.dispatch(&name, &args, self.vars.environment());

        let duration_ms = elapsed_ms(started);
        tracing::debug!(line = line.line_number, success = outcome.success, duration_ms, "command finished");

        let result = LineResult {
            line_number: line.line_number,
            command_text,
            success: outcome.success,
            output: outcome.output,
            error: outcome.error,
            duration_ms,
        };
        self.push(result)
    }

    fn evaluate(&self, condition: &str) -> Result<bool> {
        ConditionEvaluator::new(&*self.vars).evaluate(condition)
    }

    /// Record a construct that could not run and report how that affects
    /// the enclosing range.
    fn fail_construct(&mut self, line: &ScriptLine, error: BatchError, policy: ErrorPolicy) -> Flow {
        let ok = self.record(line, line.text().to_string(), Err(error), Instant::now());
        failure_flow(ok, policy)
    }

    fn record(
        &mut self,
        line: &ScriptLine,
        command_text: String,
        outcome: Result<String>,
        started: Instant,
    ) -> bool {
        let (success, output, error) = match outcome {
            Ok(output) => (true, output, None),
            Err(e) => (false, String::new(), Some(e.to_string())),
        };
        self.push(LineResult {
            line_number: line.line_number,
            command_text,
            success,
            output,
            error,
            duration_ms: elapsed_ms(started),
        })
    }

    fn push(&mut self, result: LineResult) -> bool {
        let success = result.success;
        if !success {
            self.failures += 1;
            if self.catch_depth == 0 {
                self.report.uncaught_failures += 1;
            }
            tracing::warn!(
                line = result.line_number,
                error = result.error.as_deref().unwrap_or(""),
                "line failed"
            );
        }
        if self.ctx.verbose {
            match self.ctx.output_format {
                OutputFormat::Human => println!("{}", format_line_result(&result)),
                OutputFormat::Json => eprintln!("{}", format_line_result(&result)),
            }
        }
        self.report.results.push(result);
        success
    }

    fn restore(&mut self, name: &str, previous: Option<String>) {
        match previous {
            Some(value) => {
                if let Err(e) = self.vars.set(name, value) {
                    tracing::warn!(name, error = %e, "could not restore loop binding");
                }
            }
            None => {
                self.vars.unset(name);
            }
        }
    }
}

fn failure_flow(ok: bool, policy: ErrorPolicy) -> Flow {
    if ok || policy.continues() {
        Flow::Completed
    } else {
        Flow::Stopped
    }
}

/// A nested range that stopped only stops the caller when the caller's own
/// policy is abort.
fn propagate(nested: Flow, policy: ErrorPolicy) -> Flow {
    match nested {
        Flow::Stopped if !policy.continues() => Flow::Stopped,
        _ => Flow::Completed,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Turn a resolved `@foreach` list expression into items.
///
/// Tried in order: JSON array, comma-separated, whitespace-separated.
pub fn expand_list(resolved: &str) -> Vec<String> {
    let text = resolved.trim();

    if text.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(text) {
            return values
                .into_iter()
                .map(|value| match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
        }
    }

    if text.contains(',') {
        return text
            .split(',')
            .map(|item| strip_quotes(item.trim()).to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }

    text.split_whitespace()
        .map(|item| strip_quotes(item).to_string())
        .collect()
}

/// Render a resolved command line, quoting arguments that need it
pub fn display_command(name: &str, args: &[String]) -> String {
    std::iter::once(name)
        .chain(args.iter().map(String::as_str))
        .map(|part| {
            if part.is_empty() || part.contains(char::is_whitespace) {
                format!("\"{}\"", part)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
