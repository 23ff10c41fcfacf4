//! Script parser module

pub mod ast;
pub mod directive;
pub mod lines;

pub use ast::{LineKind, Script, ScriptDiagnostic, ScriptLine, Severity};
pub use directive::{Directive, ErrorPolicy};
pub use lines::{parse_line, parse_script, strip_quotes};
