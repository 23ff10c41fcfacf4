//! Script validation for officebatch
//!
//! Validates scripts before execution. Anything reported as an error here
//! is fatal: the run is refused before a single line executes.

use crate::error::{BatchError, Result};
use crate::parser::{Directive, Script, ScriptDiagnostic, Severity};
use crate::script::blocks::BlockKind;

/// Validation options
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Maximum nesting depth for control flow
    pub max_nesting_depth: usize,
    /// Warn about `@try` blocks without `@catch`
    pub warn_uncaught_try: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 32,
            warn_uncaught_try: true,
        }
    }
}

struct OpenBlock {
    kind: BlockKind,
    line: usize,
    seen_else: bool,
    seen_catch: bool,
    seen_finally: bool,
}

impl OpenBlock {
    fn new(kind: BlockKind, line: usize) -> Self {
        Self {
            kind,
            line,
            seen_else: false,
            seen_catch: false,
            seen_finally: false,
        }
    }
}

/// Validate a parsed script. Parser diagnostics are carried over.
pub fn validate_script(script: &Script, options: &ValidationOptions) -> Vec<ScriptDiagnostic> {
    let mut diagnostics = script.diagnostics.clone();
    let mut stack: Vec<OpenBlock> = Vec::new();

    for line in &script.lines {
        if line.keyword().is_none() {
            continue;
        }
        let n = line.line_number;

        let directive = match Directive::parse(line) {
            Ok(directive) => directive,
            Err(BatchError::Parse { message, .. }) => {
                diagnostics.push(ScriptDiagnostic::error(n, message));
                continue;
            }
            Err(other) => {
                diagnostics.push(ScriptDiagnostic::error(n, other.to_string()));
                continue;
            }
        };

        match directive {
            Directive::If { .. } => open(&mut stack, &mut diagnostics, options, BlockKind::If, n),
            Directive::Foreach { .. } => {
                open(&mut stack, &mut diagnostics, options, BlockKind::Foreach, n)
            }
            Directive::While { .. } => {
                open(&mut stack, &mut diagnostics, options, BlockKind::While, n)
            }
            Directive::Try => open(&mut stack, &mut diagnostics, options, BlockKind::Try, n),

            Directive::Elif { .. } => match stack.last() {
                Some(top) if top.kind == BlockKind::If && top.seen_else => {
                    diagnostics.push(ScriptDiagnostic::error(n, "@elif after @else"));
                }
                Some(top) if top.kind == BlockKind::If => {}
                _ => diagnostics.push(ScriptDiagnostic::error(n, "@elif outside of an @if block")),
            },
            Directive::Else => match stack.last_mut() {
                Some(top) if top.kind == BlockKind::If && top.seen_else => {
                    diagnostics.push(ScriptDiagnostic::error(n, "duplicate @else"));
                }
                Some(top) if top.kind == BlockKind::If => top.seen_else = true,
                _ => diagnostics.push(ScriptDiagnostic::error(n, "@else outside of an @if block")),
            },
            Directive::Catch => match stack.last_mut() {
                Some(top) if top.kind == BlockKind::Try && top.seen_finally => {
                    diagnostics.push(ScriptDiagnostic::error(n, "@catch after @finally"));
                }
                Some(top) if top.kind == BlockKind::Try && top.seen_catch => {
                    diagnostics.push(ScriptDiagnostic::error(n, "duplicate @catch"));
                }
                Some(top) if top.kind == BlockKind::Try => top.seen_catch = true,
                _ => diagnostics.push(ScriptDiagnostic::error(n, "@catch outside of a @try block")),
            },
            Directive::Finally => match stack.last_mut() {
                Some(top) if top.kind == BlockKind::Try && top.seen_finally => {
                    diagnostics.push(ScriptDiagnostic::error(n, "duplicate @finally"));
                }
                Some(top) if top.kind == BlockKind::Try => top.seen_finally = true,
                _ => {
                    diagnostics.push(ScriptDiagnostic::error(n, "@finally outside of a @try block"))
                }
            },

            Directive::EndIf => close(&mut stack, &mut diagnostics, options, BlockKind::If, n),
            Directive::EndForeach => {
                close(&mut stack, &mut diagnostics, options, BlockKind::Foreach, n)
            }
            Directive::EndWhile => close(&mut stack, &mut diagnostics, options, BlockKind::While, n),
            Directive::EndTry => close(&mut stack, &mut diagnostics, options, BlockKind::Try, n),

            Directive::Set { .. }
            | Directive::Unset { .. }
            | Directive::Echo { .. }
            | Directive::Export { .. }
            | Directive::OnError(_) => {}
        }
    }

    for block in stack {
        diagnostics.push(ScriptDiagnostic::error(
            block.line,
            format!(
                "unmatched {} on line {}: no @{} found",
                block.kind,
                block.line,
                block.kind.terminator()
            ),
        ));
    }

    diagnostics.sort_by_key(|d| d.line.unwrap_or(0));
    diagnostics
}

fn open(
    stack: &mut Vec<OpenBlock>,
    diagnostics: &mut Vec<ScriptDiagnostic>,
    options: &ValidationOptions,
    kind: BlockKind,
    line: usize,
) {
    if stack.len() >= options.max_nesting_depth {
        diagnostics.push(ScriptDiagnostic::error(
            line,
            format!(
                "Maximum nesting depth ({}) exceeded",
                options.max_nesting_depth
            ),
        ));
    }
    stack.push(OpenBlock::new(kind, line));
}

fn close(
    stack: &mut Vec<OpenBlock>,
    diagnostics: &mut Vec<ScriptDiagnostic>,
    options: &ValidationOptions,
    kind: BlockKind,
    line: usize,
) {
    match stack.last() {
        Some(top) if top.kind == kind => {
            if let Some(block) = stack.pop() {
                if block.kind == BlockKind::Try
                    && options.warn_uncaught_try
                    && !block.seen_catch
                {
                    diagnostics.push(ScriptDiagnostic::warning(
                        block.line,
                        "@try without @catch: failures inside are not recovered",
                    ));
                }
            }
        }
        Some(top) => diagnostics.push(ScriptDiagnostic::error(
            line,
            format!(
                "@{} found while {} from line {} is still open",
                kind.terminator(),
                top.kind,
                top.line
            ),
        )),
        None => diagnostics.push(ScriptDiagnostic::error(
            line,
            format!("@{} without a matching {}", kind.terminator(), kind),
        )),
    }
}

/// Check if a script has any validation errors (not just warnings)
pub fn has_errors(diagnostics: &[ScriptDiagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

/// Check if a script has any validation warnings
pub fn has_warnings(diagnostics: &[ScriptDiagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Warning)
}

/// Validate and turn the first error into a fatal parse error.
///
/// On success the remaining warnings are returned.
pub fn ensure_valid(script: &Script, options: &ValidationOptions) -> Result<Vec<ScriptDiagnostic>> {
    let diagnostics = validate_script(script, options);
    if let Some(first) = diagnostics.iter().find(|d| d.severity == Severity::Error) {
        return Err(BatchError::parse(first.line.unwrap_or(0), first.message.clone()));
    }
    Ok(diagnostics)
}
