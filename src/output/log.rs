//! Plain-text execution log

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::script::runner::BatchResult;

/// Render the execution log for a finished (or stopped) run
pub fn render_execution_log(result: &BatchResult) -> String {
    let mut out = String::new();

    out.push_str("officebatch execution log\n");
    out.push_str("=========================\n");
    out.push_str(&format!("Script:   {}\n", result.script));
    out.push_str(&format!("Started:  {}\n", result.started_at.to_rfc3339()));
    out.push_str(&format!("Finished: {}\n", result.finished_at.to_rfc3339()));
    out.push_str(&format!("Duration: {} ms\n", result.total_duration_ms));
    out.push_str(&format!(
        "Result:   {}\n",
        if result.success { "SUCCESS" } else { "FAILED" }
    ));
    if let Some(ref error) = result.error {
        out.push_str(&format!("Error:    {}\n", error));
    }
    out.push('\n');

    for entry in &result.log {
        out.push_str(&format!(
            "[line {}] {} ({} ms)\n",
            entry.line_number,
            if entry.success { "SUCCESS" } else { "FAILED" },
            entry.duration_ms
        ));
        out.push_str(&format!("  Command: {}\n", entry.command_text));
        if !entry.output.is_empty() {
            out.push_str("  Output:\n");
            for line in entry.output.lines() {
                out.push_str(&format!("    {}\n", line));
            }
        }
        if let Some(ref error) = entry.error {
            out.push_str(&format!("  Error:   {}\n", error));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Summary: executed={} skipped={} failed={}\n",
        result.executed_count, result.skipped_count, result.failed_count
    ));
    out
}

/// Write the execution log, creating parent directories as needed
pub fn write_execution_log(path: &Path, result: &BatchResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_execution_log(result))?;
    tracing::info!(path = %path.display(), "execution log written");
    Ok(())
}
