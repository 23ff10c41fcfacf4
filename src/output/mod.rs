//! Output formatting module

pub mod formatter;
pub mod human;
pub mod json;
pub mod log;

pub use formatter::{format_output, OutputFormat};
pub use log::{render_execution_log, write_execution_log};
