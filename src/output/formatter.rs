//! Output formatting

use serde::{Deserialize, Serialize};

use crate::output::human::format_human;
use crate::output::json::format_json;
use crate::script::runner::BatchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Human,
    Json,
}

pub fn format_output(result: &BatchResult, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(result),
        OutputFormat::Json => format_json(result),
    }
}
