//! Run summary formatting.

use crate::error::LoadGenResult;
use crate::metrics::RunSummary;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::str::FromStr;

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    None,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown output format '{other}' (expected table, json or none)"
            )),
        }
    }
}

/// Formats run summaries for output.
pub struct SummaryReport;

impl SummaryReport {
    /// Render a summary, `None` when output is disabled.
    pub fn render(summary: &RunSummary, format: OutputFormat) -> LoadGenResult<Option<String>> {
        match format {
            OutputFormat::Table => Ok(Some(Self::format_table(summary))),
            OutputFormat::Json => Ok(Some(Self::format_json(summary)?)),
            OutputFormat::None => Ok(None),
        }
    }

    /// Format the summary as a console table.
    pub fn format_table(summary: &RunSummary) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Pub/Sub Load Gen: {}", summary.topic)]);

        table.add_row(vec!["Started:", &summary.started_at]);
        table.add_row(vec![
            "Subscription:",
            summary.subscription.as_deref().unwrap_or("-"),
        ]);
        table.add_row(vec![
            "Messages Submitted:",
            &summary.messages_submitted.to_string(),
        ]);
        table.add_row(vec![
            "Bytes Submitted:",
            &summary.bytes_submitted.to_string(),
        ]);
        table.add_row(vec!["Duration:", &format!("{:.1}s", summary.elapsed_secs)]);
        table.add_row(vec![
            "Messages/sec:",
            &format!("{:.2}", summary.messages_per_second),
        ]);

        table.to_string()
    }

    /// Format the summary as JSON.
    pub fn format_json(summary: &RunSummary) -> LoadGenResult<String> {
        Ok(serde_json::to_string_pretty(summary)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunSummary {
        RunSummary {
            topic: "impression_event".to_string(),
            subscription: None,
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            messages_submitted: 300,
            bytes_submitted: 600,
            elapsed_secs: 300.2,
            messages_per_second: 0.999,
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_table_contains_counts() {
        let out = SummaryReport::format_table(&sample());
        assert!(out.contains("impression_event"));
        assert!(out.contains("300"));
        assert!(out.contains("300.2s"));
    }

    #[test]
    fn test_json_fields() {
        let out = SummaryReport::format_json(&sample()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["messages_submitted"], 300);
        assert!(v["subscription"].is_null());
    }

    #[test]
    fn test_none_renders_nothing() {
        assert!(SummaryReport::render(&sample(), OutputFormat::None)
            .unwrap()
            .is_none());
    }
}
