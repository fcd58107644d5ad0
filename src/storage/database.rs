//! SQLite Database
//!
//! Embedded chat-history store using rusqlite with r2d2 connection pooling.
//! Holds two tables: `sessions` and `messages`. Also exposes the direct
//! aggregate queries the analysis fallback uses when the analysis server is
//! unavailable.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use uuid::Uuid;

use crate::utils::error::{AppError, AppResult};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// One stored chat message
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// Summary row for a session listing
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub created_at: String,
    pub last_activity: String,
    pub first_message: String,
}

/// One day of session activity
#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub date: String,
    pub sessions: i64,
}

/// One session ranked by message volume
#[derive(Debug, Clone)]
pub struct ActiveSessionRow {
    pub id: String,
    pub message_count: i64,
    pub last_active: String,
}

/// Chat-history store over a pooled SQLite connection
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file at `path` and initialize the schema.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database for testing.
    pub fn open_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                last_activity TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (session_id) REFERENCES sessions (id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Create a new chat session and return its id.
    pub fn create_session(&self) -> AppResult<String> {
        let session_id = Uuid::new_v4().to_string();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (id) VALUES (?1)",
            params![session_id],
        )?;
        Ok(session_id)
    }

    /// Save a message and bump the session's `last_activity`.
    pub fn save_message(&self, session_id: &str, role: &str, content: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (session_id, role, content) VALUES (?1, ?2, ?3)",
            params![session_id, role, content],
        )?;
        conn.execute(
            "UPDATE sessions SET last_activity = CURRENT_TIMESTAMP WHERE id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    /// All messages of a session in timestamp order.
    pub fn conversation_history(&self, session_id: &str) -> AppResult<Vec<StoredMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM messages
             WHERE session_id = ?1 ORDER BY timestamp",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(StoredMessage {
                role: row.get(0)?,
                content: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Recent sessions, newest activity first, with the opening user message
    /// as a display title.
    pub fn recent_sessions(&self, limit: u32) -> AppResult<Vec<SessionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.created_at, s.last_activity,
                    (SELECT content FROM messages
                     WHERE session_id = s.id AND role = 'user'
                     ORDER BY timestamp LIMIT 1) AS first_message
             FROM sessions s
             ORDER BY s.last_activity DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                created_at: row.get(1)?,
                last_activity: row.get(2)?,
                first_message: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_else(|| "New Chat".to_string()),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Row count of one of the known tables.
    ///
    /// The table name is matched against an allowlist; it is never
    /// interpolated from caller input.
    pub fn count(&self, table: &str) -> AppResult<i64> {
        let sql = match table {
            "sessions" => "SELECT COUNT(*) FROM sessions",
            "messages" => "SELECT COUNT(*) FROM messages",
            other => {
                return Err(AppError::validation(format!(
                    "Unknown table for count: {}",
                    other
                )))
            }
        };
        let conn = self.conn()?;
        let count = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sessions active per day over the trailing `days` window, newest day
    /// first, at most 5 rows.
    pub fn recent_activity(&self, days: u32) -> AppResult<Vec<ActivityRow>> {
        let conn = self.conn()?;
        let modifier = format!("-{} days", days);
        let mut stmt = conn.prepare(
            "SELECT DATE(s.last_activity) AS date, COUNT(*) AS sessions
             FROM sessions s
             WHERE s.last_activity > datetime('now', ?1)
             GROUP BY DATE(s.last_activity)
             ORDER BY date DESC
             LIMIT 5",
        )?;
        let rows = stmt.query_map(params![modifier], |row| {
            Ok(ActivityRow {
                date: row.get(0)?,
                sessions: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Top sessions by message count. Ties are broken by most recent
    /// activity so the ordering is deterministic.
    pub fn top_sessions_by_message_count(&self, limit: u32) -> AppResult<Vec<ActiveSessionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, COUNT(m.id) AS message_count,
                    datetime(s.last_activity) AS last_active
             FROM sessions s
             LEFT JOIN messages m ON s.id = m.session_id
             GROUP BY s.id
             ORDER BY message_count DESC, s.last_activity DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ActiveSessionRow {
                id: row.get(0)?,
                message_count: row.get(1)?,
                last_active: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let s1 = db.create_session().unwrap();
        let s2 = db.create_session().unwrap();
        db.save_message(&s1, "user", "hello").unwrap();
        db.save_message(&s1, "assistant", "hi there").unwrap();
        db.save_message(&s1, "user", "how are you?").unwrap();
        db.save_message(&s2, "user", "second session").unwrap();
        db
    }

    #[test]
    fn test_create_session_returns_uuid() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_session().unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(db.count("sessions").unwrap(), 1);
    }

    #[test]
    fn test_save_and_read_history() {
        let db = seeded_db();
        let sessions = db.recent_sessions(10).unwrap();
        let busy = sessions
            .iter()
            .find(|s| s.first_message == "hello")
            .unwrap();
        let history = db.conversation_history(&busy.id).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, "assistant");
    }

    #[test]
    fn test_counts() {
        let db = seeded_db();
        assert_eq!(db.count("sessions").unwrap(), 2);
        assert_eq!(db.count("messages").unwrap(), 4);
    }

    #[test]
    fn test_count_rejects_unknown_table() {
        let db = Database::open_in_memory().unwrap();
        let result = db.count("messages; DROP TABLE sessions");
        assert!(result.is_err());
    }

    #[test]
    fn test_recent_sessions_uses_placeholder_title() {
        let db = Database::open_in_memory().unwrap();
        db.create_session().unwrap();
        let sessions = db.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].first_message, "New Chat");
    }

    #[test]
    fn test_recent_activity_groups_by_day() {
        let db = seeded_db();
        let activity = db.recent_activity(7).unwrap();
        // Both sessions were touched today
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].sessions, 2);
    }

    #[test]
    fn test_top_sessions_ordering() {
        let db = seeded_db();
        let top = db.top_sessions_by_message_count(3).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].message_count, 3);
        assert_eq!(top[1].message_count, 1);
    }

    #[test]
    fn test_top_sessions_limit() {
        let db = seeded_db();
        let top = db.top_sessions_by_message_count(1).unwrap();
        assert_eq!(top.len(), 1);
    }
}
