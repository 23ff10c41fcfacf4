//! JSON output formatting

use serde_json::json;

use crate::script::runner::BatchResult;

pub fn format_json(result: &BatchResult) -> String {
    let data = serde_json::to_value(result)
        .unwrap_or_else(|e| json!({ "error": format!("failed to serialize result: {}", e) }));
    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::executor::LineResult;
    use chrono::Utc;

    #[test]
    fn test_format_json_fields() {
        let now = Utc::now();
        let result = BatchResult {
            script: "monthly.batch".to_string(),
            success: false,
            executed_count: 1,
            skipped_count: 0,
            failed_count: 1,
            total_duration_ms: 3,
            started_at: now,
            finished_at: now,
            dry_run: false,
            error: None,
            log: vec![LineResult {
                line_number: 4,
                command_text: "excel open a.xlsx".to_string(),
                success: false,
                output: String::new(),
                error: Some("file not found".to_string()),
                duration_ms: 3,
            }],
        };
        let value: serde_json::Value = serde_json::from_str(&format_json(&result)).unwrap();
        assert_eq!(value["failed_count"], 1);
        assert_eq!(value["log"][0]["line_number"], 4);
        assert_eq!(value["log"][0]["error"], "file not found");
    }
}
