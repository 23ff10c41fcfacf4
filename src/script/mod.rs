//! Script execution module for officebatch
//!
//! Handles block matching, validation and running of batch script files.

pub mod blocks;
pub mod runner;
pub mod validator;

pub use blocks::{find_block, outline, BlockKind, BlockSpan};
pub use runner::{check_file, dry_run_listing, explain_script, run, BatchResult, ScriptRunner};
pub use validator::{ensure_valid, has_errors, has_warnings, validate_script, ValidationOptions};
