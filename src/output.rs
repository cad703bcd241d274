//! Rendering of execution outcomes for the command-line front end.

use crate::db::{ResultSet, StatementTag};
use crate::execution::ExecutionOutcome;
use serde::Serialize;

/// Output format for delivered outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table per statement.
    #[default]
    Text,
    /// One JSON document per statement.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonOutcome<'a> {
    tag: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: &'a String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ResultSet>,
}

/// Formats outcomes according to the configured format.
pub struct OutcomeFormatter {
    format: OutputFormat,
}

impl OutcomeFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats one outcome. `tag` identifies the call when it failed and no
    /// result set is available.
    pub fn format(&self, tag: &StatementTag, outcome: &ExecutionOutcome) -> String {
        match self.format {
            OutputFormat::Text => Self::format_text(tag, outcome),
            OutputFormat::Json => Self::format_json(tag, outcome),
        }
    }

    fn format_text(tag: &StatementTag, outcome: &ExecutionOutcome) -> String {
        let Some(result_set) = outcome.result_set.as_ref().filter(|_| outcome.success) else {
            return format!("[{tag}] error: {}\n", outcome.error_message);
        };

        let mut text = format!("[{tag}] ");
        if result_set.column_count() == 0 {
            text.push_str(&affected_summary(result_set.affected_rows()));
            text.push('\n');
            return text;
        }

        let rows = result_set.row_count();
        text.push_str(&format!(
            "{} row{}\n",
            rows,
            if rows == 1 { "" } else { "s" }
        ));
        text.push_str(&render_table(result_set));
        text
    }

    fn format_json(tag: &StatementTag, outcome: &ExecutionOutcome) -> String {
        let json_output = JsonOutcome {
            tag: tag.as_str(),
            success: outcome.success,
            error: &outcome.error_message,
            result: outcome.result_set.as_ref(),
        };

        serde_json::to_string(&json_output)
            .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
    }
}

fn affected_summary(affected_rows: i64) -> String {
    if affected_rows < 0 {
        "statement executed".to_string()
    } else {
        format!("{affected_rows} row(s) affected")
    }
}

/// Renders a column-oriented result set as a row-oriented text table.
fn render_table(result_set: &ResultSet) -> String {
    let names = result_set.column_names();
    let mut widths: Vec<usize> = names.iter().map(|name| name.chars().count()).collect();
    for (width, column) in widths.iter_mut().zip(result_set.values()) {
        for value in column.as_slice() {
            *width = (*width).max(value.chars().count());
        }
    }

    let mut table = String::new();
    push_line(&mut table, names.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut table, rule.iter().map(String::as_str), &widths);
    for index in 0..result_set.row_count() {
        if let Some(row) = result_set.row(index) {
            push_line(&mut table, row.into_iter(), &widths);
        }
    }
    table
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}
