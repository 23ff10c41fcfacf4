//! officebatch - batch scripting for Office-automation commands
//!
//! A script is a plain text file of command lines and `@` directives.
//! Commands are resolved against a variable store and handed to a
//! [`CommandDispatcher`]; directives provide variables, conditionals,
//! loops and error handling around them.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use officebatch::{format_output, run, ExecutionContext, OutputFormat};
//!
//! let result = run(Path::new("monthly.batch"), ExecutionContext::default(), None, &[]).unwrap();
//! println!("{}", format_output(&result, &OutputFormat::Human));
//! ```

pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod output;
pub mod parser;
pub mod script;

pub use context::{EnvironmentContext, VariableStore};
pub use engine::{CommandDispatcher, DispatchOutcome, ExecutionContext, LineResult, ProcessDispatcher};
pub use error::{BatchError, Result};
pub use output::{format_output, OutputFormat};
pub use parser::{parse_script, Script, ScriptLine};
pub use script::{run, validate_script, BatchResult, ScriptRunner};
