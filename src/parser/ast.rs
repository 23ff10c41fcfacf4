//! Line records produced by the script parser

use serde::{Deserialize, Serialize};

/// What a single script line is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    Empty,
    Comment,
    Directive,
    Command,
}

impl std::fmt::Display for LineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineKind::Empty => write!(f, "EMPTY"),
            LineKind::Comment => write!(f, "COMMENT"),
            LineKind::Directive => write!(f, "DIRECTIVE"),
            LineKind::Command => write!(f, "COMMAND"),
        }
    }
}

/// One parsed script line. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    /// 1-based line number in the source file
    pub line_number: usize,
    /// The line exactly as read
    pub raw_text: String,
    pub kind: LineKind,
    /// Command name, or the lowercased directive keyword without `@`
    pub command: String,
    /// Command arguments, or the unparsed directive body as a single entry
    pub args: Vec<String>,
}

impl ScriptLine {
    /// Directive keyword if this is a directive line
    pub fn keyword(&self) -> Option<&str> {
        match self.kind {
            LineKind::Directive => Some(self.command.as_str()),
            _ => None,
        }
    }

    /// True when this line is the directive `@<keyword>`
    pub fn is_directive(&self, keyword: &str) -> bool {
        self.keyword() == Some(keyword)
    }

    /// Unparsed directive body (empty for commands)
    pub fn directive_body(&self) -> &str {
        match self.kind {
            LineKind::Directive => self.args.first().map(String::as_str).unwrap_or(""),
            _ => "",
        }
    }

    /// Whether the engine ever does anything with this line
    pub fn is_executable(&self) -> bool {
        matches!(self.kind, LineKind::Directive | LineKind::Command)
    }

    /// Trimmed source text, used in results and logs
    pub fn text(&self) -> &str {
        self.raw_text.trim()
    }
}

/// A parsed script: a flat, randomly indexable sequence of lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
    /// Non-fatal problems found while parsing
    pub diagnostics: Vec<ScriptDiagnostic>,
}

impl Script {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A problem found while parsing or validating a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDiagnostic {
    pub line: Option<usize>,
    pub message: String,
    pub severity: Severity,
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl ScriptDiagnostic {
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for ScriptDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        if let Some(line) = self.line {
            write!(f, "{} (line {}): {}", prefix, line, self.message)
        } else {
            write!(f, "{}: {}", prefix, self.message)
        }
    }
}
