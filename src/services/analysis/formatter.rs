//! Result Formatting
//!
//! Deterministic rendering of normalized tool outcomes as display text.
//! Row and column order are preserved exactly as received.

use serde_json::{Map, Value};

use super::protocol::ToolOutcome;

/// Rows rendered before truncation kicks in
pub const MAX_ROWS: usize = 10;

/// Rendering of an empty result set
pub const EMPTY_MESSAGE: &str = "No data found.";

/// Render a normalized tool outcome.
pub fn format_outcome(outcome: &ToolOutcome) -> String {
    match outcome {
        ToolOutcome::Rows(rows) => format_rows(rows),
        ToolOutcome::Scalar(value) => format!("Result: {}", render_value(value)),
        ToolOutcome::RawText(text) => text.clone(),
    }
}

/// Render query rows.
///
/// A single row with a single column is rendered as a labeled scalar;
/// anything else becomes a bulleted list capped at `MAX_ROWS` with a
/// remainder count.
pub fn format_rows(rows: &[Map<String, Value>]) -> String {
    if rows.is_empty() {
        return EMPTY_MESSAGE.to_string();
    }

    if rows.len() == 1 && rows[0].len() == 1 {
        let value = rows[0].values().next().map(render_value).unwrap_or_default();
        return format!("Result: {}", value);
    }

    let mut lines: Vec<String> = rows
        .iter()
        .take(MAX_ROWS)
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .map(|(key, value)| format!("{}: {}", key, render_value(value)))
                .collect();
            format!("  - {}", cells.join(", "))
        })
        .collect();

    if rows.len() > MAX_ROWS {
        lines.push(format!("  ... and {} more rows", rows.len() - MAX_ROWS));
    }

    lines.join("\n")
}

/// Strings render without quotes; everything else uses its JSON form.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
