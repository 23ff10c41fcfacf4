//! Human-readable output formatting

use crate::engine::executor::LineResult;
use crate::script::runner::BatchResult;

pub fn format_human(result: &BatchResult) -> String {
    let mut output = String::from("Batch Summary\n-------------\n");
    output.push_str(&format!("Script:    {}\n", result.script));
    output.push_str(&format!(
        "Status:    {}\n",
        if result.dry_run {
            "DRY RUN"
        } else if result.success {
            "SUCCESS"
        } else {
            "FAILED"
        }
    ));
    output.push_str(&format!("Executed:  {}\n", result.executed_count));
    output.push_str(&format!("Skipped:   {}\n", result.skipped_count));
    output.push_str(&format!("Failed:    {}\n", result.failed_count));
    output.push_str(&format!("Duration:  {} ms", result.total_duration_ms));

    if let Some(ref error) = result.error {
        output.push_str(&format!("\nError:     {}", error));
    }

    let failed: Vec<&LineResult> = result.log.iter().filter(|r| !r.success).collect();
    if !failed.is_empty() {
        output.push_str("\n\nFailed lines\n");
        output.push_str(&"-".repeat(60));
        for line in failed {
            output.push_str(&format!(
                "\n{:>5}  {}\n       {}",
                line.line_number,
                truncate(&line.command_text, 52),
                line.error.as_deref().unwrap_or("(no error message)")
            ));
        }
    }

    output
}

/// One-line status for a single executed line
pub fn format_line_result(result: &LineResult) -> String {
    let status = if result.success { "SUCCESS" } else { "FAILED" };
    let mut line = format!(
        "[line {:>4}] {:<7} {} ({} ms)",
        result.line_number, status, result.command_text, result.duration_ms
    );
    if let Some(ref error) = result.error {
        line.push_str(&format!(": {}", error));
    }
    line
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(n: usize, success: bool) -> LineResult {
        LineResult {
            line_number: n,
            command_text: format!("excel refresh sheet{}", n),
            success,
            output: String::new(),
            error: if success { None } else { Some("refresh failed".to_string()) },
            duration_ms: 7,
        }
    }

    #[test]
    fn test_format_human_lists_failures() {
        let now = Utc::now();
        let result = BatchResult {
            script: "nightly.batch".to_string(),
            success: false,
            executed_count: 2,
            skipped_count: 1,
            failed_count: 1,
            total_duration_ms: 14,
            started_at: now,
            finished_at: now,
            dry_run: false,
            error: None,
            log: vec![line(1, true), line(2, false)],
        };
        let text = format_human(&result);
        assert!(text.contains("Status:    FAILED"));
        assert!(text.contains("Executed:  2"));
        assert!(text.contains("refresh failed"));
        assert!(!text.contains("sheet1"));
    }

    #[test]
    fn test_format_line_result() {
        assert_eq!(
            format_line_result(&line(3, false)),
            "[line    3] FAILED  excel refresh sheet3 (7 ms): refresh failed"
        );
        assert_eq!(
            format_line_result(&line(12, true)),
            "[line   12] SUCCESS excel refresh sheet12 (7 ms)"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
