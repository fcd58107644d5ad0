//! Question Classification and Metadata Handling
//!
//! Keyword classification of free-text questions, plus the metadata path
//! that answers schema questions directly from analysis-server tools
//! without going through SQL generation.

use serde_json::{json, Value};
use tracing::debug;

use super::protocol::{McpClient, ToolOutcome};

/// A question containing any of these asks for chat-history analysis rather
/// than ordinary conversation.
const ANALYSIS_KEYWORDS: &[&str] = &[
    "database",
    "db",
    "sql",
    "query",
    "table",
    "sessions",
    "messages",
    "conversation",
    "chat history",
    "statistics",
    "stats",
    "count",
    "analyze",
    "analysis",
    "data",
    "search history",
    "most active",
    "recent sessions",
    "message count",
    "user activity",
    "trends",
];

/// Schema-shaped phrasing: the question is about structure, not data.
const METADATA_KEYWORDS: &[&str] = &[
    "table",
    "tables",
    "schema",
    "structure",
    "columns",
    "database structure",
    "what tables",
    "how many tables",
    "table names",
    "table list",
];

fn contains_any(text_lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text_lower.contains(phrase))
}

/// Does this message ask for database analysis at all?
pub fn is_database_query(text: &str) -> bool {
    contains_any(&text.to_lowercase(), ANALYSIS_KEYWORDS)
}

/// Does this question ask about database structure?
pub fn is_metadata_query(text: &str) -> bool {
    contains_any(&text.to_lowercase(), METADATA_KEYWORDS)
}

/// Answer a metadata question through analysis-server tools.
///
/// Returns `None` when the question matches none of the known phrasings or
/// the tool call fails; the router then continues down the chain.
pub async fn handle_metadata(client: &McpClient, question: &str) -> Option<String> {
    let question_lower = question.to_lowercase();

    if contains_any(
        &question_lower,
        &["how many tables", "count tables", "number of tables"],
    ) {
        let names = list_table_names(client).await?;
        return Some(format!(
            "Answer to: \"{}\"\n\nResult: {} tables\n\nSource: list_tables tool",
            question,
            names.len()
        ));
    }

    if contains_any(
        &question_lower,
        &["what tables", "list tables", "table names", "show tables"],
    ) {
        let names = list_table_names(client).await?;
        if names.is_empty() {
            return None;
        }
        let listing: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("  {}. {}", i + 1, name))
            .collect();
        return Some(format!(
            "Answer to: \"{}\"\n\nTables in your database:\n{}\n\nSource: list_tables tool",
            question,
            listing.join("\n")
        ));
    }

    if contains_any(
        &question_lower,
        &["database info", "db info", "database structure"],
    ) {
        let value = client.call_tool("db_info", json!({})).await.ok()?;
        let lines = describe_db_info(ToolOutcome::from_value(value))?;
        return Some(format!(
            "Answer to: \"{}\"\n\nDatabase information:\n{}\n\nSource: db_info tool",
            question, lines
        ));
    }

    debug!("no metadata handler matched: {}", question);
    None
}

/// Fetch and flatten the `list_tables` result into plain names.
async fn list_table_names(client: &McpClient) -> Option<Vec<String>> {
    let value = client.call_tool("list_tables", json!({})).await.ok()?;
    let names = match ToolOutcome::from_value(value) {
        ToolOutcome::Rows(rows) => rows
            .iter()
            .filter_map(|row| {
                row.get("name")
                    .or_else(|| row.values().next())
                    .map(render_name)
            })
            .collect(),
        ToolOutcome::RawText(text) => vec![text],
        ToolOutcome::Scalar(_) => Vec::new(),
    };
    Some(names)
}

fn render_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe_db_info(outcome: ToolOutcome) -> Option<String> {
    match outcome {
        ToolOutcome::Scalar(Value::Object(map)) => {
            let lines: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("  - {}: {}", key, render_name(value)))
                .collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        ToolOutcome::Rows(rows) => {
            (!rows.is_empty()).then(|| super::formatter::format_rows(&rows))
        }
        ToolOutcome::RawText(text) => Some(text),
        ToolOutcome::Scalar(_) => None,
    }
}
