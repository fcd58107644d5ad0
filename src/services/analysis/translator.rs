//! NL-to-SQL Translation
//!
//! Turns a free-text question into one read-only SQL statement through the
//! chat model, then executes it through the analysis server. A statement
//! that fails the safety filter is never executed.

use serde_json::json;
use tracing::{debug, info, warn};

use super::formatter;
use super::protocol::{McpClient, ToolOutcome};
use super::AnalysisError;
use crate::services::llm::{ChatModel, ChatTurn};

/// Sentinel the model is instructed to return for untranslatable questions
const INVALID_SENTINEL: &str = "INVALID";

/// Keywords that disqualify a generated statement, matched as
/// case-insensitive substrings
const FORBIDDEN_KEYWORDS: &[&str] = &["DROP", "DELETE", "UPDATE", "INSERT"];

/// Build the translation prompt: fixed schema description plus worked
/// examples, ending with the user's question.
fn build_prompt(question: &str) -> String {
    format!(
        r#"Convert this natural language question to a SQL query for a chat application database.

Database schema:
- sessions table: id (TEXT), created_at (TIMESTAMP), last_activity (TIMESTAMP)
- messages table: id (INTEGER), session_id (TEXT), role (TEXT), content (TEXT), timestamp (TIMESTAMP)

The 'role' field contains either 'user' or 'assistant'.

Question: {question}

Generate ONLY the SQL query, no explanations. The query must be safe and read-only (SELECT only).
If the question cannot be converted to SQL or seems unsafe, respond with "INVALID".

Examples:
- "How many messages have I sent?" -> SELECT COUNT(*) FROM messages WHERE role = 'user'
- "What are my most recent conversations?" -> SELECT s.id, s.last_activity FROM sessions s ORDER BY s.last_activity DESC LIMIT 5
- "How many sessions do I have?" -> SELECT COUNT(*) FROM sessions
- "How many tables do I have?" -> SELECT COUNT(*) FROM sqlite_master WHERE type='table'
- "What tables exist?" -> SELECT name FROM sqlite_master WHERE type='table'

For metadata questions about tables, use the sqlite_master system table
(columns: name, type, sql; type='table' for user tables).

SQL Query:"#
    )
}

/// Remove Markdown code-fence wrapping (``` or ```sql) from a model reply.
fn strip_code_fences(reply: &str) -> String {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Safety filter for generated statements.
///
/// The statement must start with SELECT, carry none of the forbidden
/// keywords anywhere (case-insensitive substring match), and must not be the
/// INVALID sentinel.
pub fn is_safe_select(sql: &str) -> bool {
    if sql == INVALID_SENTINEL {
        return false;
    }
    let upper = sql.to_uppercase();
    upper.starts_with("SELECT") && FORBIDDEN_KEYWORDS.iter().all(|kw| !upper.contains(kw))
}

/// Generate one safe SQL statement for the question, or fail with
/// `TranslationFailed`. LLM failures and filtered statements are
/// indistinguishable to the caller: neither produces executable SQL.
pub async fn generate_sql(
    model: &dyn ChatModel,
    question: &str,
) -> Result<String, AnalysisError> {
    let prompt = build_prompt(question);
    let reply = model
        .chat(&[ChatTurn::user(prompt)])
        .await
        .map_err(|e| {
            debug!("SQL generation request failed: {}", e);
            AnalysisError::TranslationFailed
        })?;

    let sql = strip_code_fences(&reply);
    if is_safe_select(&sql) {
        Ok(sql)
    } else {
        warn!("rejected generated statement: {}", sql);
        Err(AnalysisError::TranslationFailed)
    }
}

/// Full NL-to-SQL path: translate, execute through the `query` tool, format.
///
/// Returns `None` when no answer could be produced (the router moves on to
/// the canned report). An executed statement with an empty result set
/// produces an explicit no-results answer instead: "nothing matched" is a
/// real answer, "could not ask" is not.
pub async fn execute(
    model: &dyn ChatModel,
    client: &McpClient,
    question: &str,
) -> Option<String> {
    let sql = match generate_sql(model, question).await {
        Ok(sql) => sql,
        Err(_) => return None,
    };
    info!("generated SQL: {}", sql);

    let value = match client
        .call_tool("query", json!({ "sql": sql, "values": [] }))
        .await
    {
        Ok(value) => value,
        Err(e) => {
            warn!("query execution failed: {}", e);
            return None;
        }
    };

    let outcome = ToolOutcome::from_value(value);
    if matches!(&outcome, ToolOutcome::Rows(rows) if rows.is_empty()) {
        return Some(format!("No results found for: \"{}\"", question));
    }

    let body = formatter::format_outcome(&outcome);
    Some(format!(
        "Answer to: \"{}\"\n\n{}\n\nGenerated SQL: {}",
        question, body, sql
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::{LlmError, LlmResult};
    use async_trait::async_trait;

    struct FixedModel(String);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(&self, _messages: &[ChatTurn]) -> LlmResult<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn chat(&self, _messages: &[ChatTurn]) -> LlmResult<String> {
            Err(LlmError::Status(500))
        }
    }

    #[test]
    fn test_safety_filter_accepts_select() {
        assert!(is_safe_select("SELECT COUNT(*) FROM messages"));
        assert!(is_safe_select("select id from sessions limit 5"));
    }

    #[test]
    fn test_safety_filter_rejects_mutations() {
        assert!(!is_safe_select("DROP TABLE sessions"));
        assert!(!is_safe_select("DELETE FROM messages"));
        assert!(!is_safe_select("UPDATE sessions SET id = 1"));
        assert!(!is_safe_select("INSERT INTO messages VALUES (1)"));
    }

    #[test]
    fn test_safety_filter_rejects_embedded_mutations() {
        assert!(!is_safe_select("SELECT 1; DROP TABLE sessions"));
        assert!(!is_safe_select("SELECT 1; delete from messages"));
        assert!(!is_safe_select("sElEcT 1; DrOp TABLE x"));
    }

    #[test]
    fn test_safety_filter_rejects_non_select() {
        assert!(!is_safe_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_safe_select("PRAGMA table_info(sessions)"));
        assert!(!is_safe_select(""));
    }

    #[test]
    fn test_safety_filter_rejects_sentinel() {
        assert!(!is_safe_select("INVALID"));
    }

    #[test]
    fn test_strip_plain_fences() {
        assert_eq!(
            strip_code_fences("```\nSELECT 1\n```"),
            "SELECT 1"
        );
    }

    #[test]
    fn test_strip_sql_fences() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT COUNT(*) FROM sessions\n```"),
            "SELECT COUNT(*) FROM sessions"
        );
    }

    #[test]
    fn test_strip_fences_noop_without_fences() {
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[tokio::test]
    async fn test_generate_sql_happy_path() {
        let model = FixedModel("SELECT COUNT(*) FROM messages WHERE role = 'user'".to_string());
        let sql = generate_sql(&model, "How many messages have I sent?")
            .await
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM messages WHERE role = 'user'");
    }

    #[tokio::test]
    async fn test_generate_sql_strips_fences() {
        let model = FixedModel("```sql\nSELECT COUNT(*) FROM sessions\n```".to_string());
        let sql = generate_sql(&model, "How many sessions?").await.unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM sessions");
    }

    #[tokio::test]
    async fn test_generate_sql_rejects_unsafe() {
        let model = FixedModel("DROP TABLE sessions".to_string());
        let result = generate_sql(&model, "delete everything").await;
        assert!(matches!(result, Err(AnalysisError::TranslationFailed)));
    }

    #[tokio::test]
    async fn test_generate_sql_rejects_sentinel() {
        let model = FixedModel("INVALID".to_string());
        let result = generate_sql(&model, "what is the meaning of life?").await;
        assert!(matches!(result, Err(AnalysisError::TranslationFailed)));
    }

    #[tokio::test]
    async fn test_generate_sql_llm_failure() {
        let result = generate_sql(&FailingModel, "How many sessions?").await;
        assert!(matches!(result, Err(AnalysisError::TranslationFailed)));
    }

    #[tokio::test]
    async fn test_execute_untranslatable_falls_through() {
        // Client was never started; with translation failing first, the
        // transport is never touched.
        let client = McpClient::new();
        let answer = execute(&FixedModel("INVALID".to_string()), &client, "gibberish").await;
        assert!(answer.is_none());
    }

    #[test]
    fn test_prompt_embeds_question_and_schema() {
        let prompt = build_prompt("How many messages have I sent?");
        assert!(prompt.contains("How many messages have I sent?"));
        assert!(prompt.contains("sessions table"));
        assert!(prompt.contains("messages table"));
        assert!(prompt.contains("INVALID"));
    }
}
