use std::path::Path;

use chrono::Utc;
use healthpulse_common::{ChatMessage, ChatRole, Error, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::parse_timestamp;

/// Persistent storage for conversation turns.
///
/// Turns are only ever written in user/assistant pairs through
/// [`ChatStore::append_turn`], inside a single transaction, so readers never
/// observe half a pair.
pub struct ChatStore {
    conn: Connection,
}

impl ChatStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening chat store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS chat_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_messages_user
                    ON chat_messages(user_id, created_at);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Persist one turn: the user's question and the assistant's answer as a
    /// single transaction. Either both rows commit or neither does.
    pub fn append_turn(
        &mut self,
        user_id: i64,
        question: &str,
        answer: &str,
    ) -> Result<(ChatMessage, ChatMessage)> {
        let asked_at = Utc::now();
        let answered_at = Utc::now().max(asked_at);

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT INTO chat_messages (user_id, role, content, created_at)
             VALUES (?1, 'user', ?2, ?3)",
            params![user_id, question, asked_at.to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("failed to insert user turn: {e}")))?;
        let question_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO chat_messages (user_id, role, content, created_at)
             VALUES (?1, 'assistant', ?2, ?3)",
            params![user_id, answer, answered_at.to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("failed to insert assistant turn: {e}")))?;
        let answer_id = tx.last_insert_rowid();

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit turn: {e}")))?;

        Ok((
            ChatMessage {
                id: question_id,
                user_id,
                role: ChatRole::User,
                content: question.to_string(),
                created_at: asked_at,
            },
            ChatMessage {
                id: answer_id,
                user_id,
                role: ChatRole::Assistant,
                content: answer.to_string(),
                created_at: answered_at,
            },
        ))
    }

    /// The `limit` newest turns, newest first. Callers reverse this window
    /// to restore chronological order before rendering it into a prompt.
    pub fn recent_messages(&self, user_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        self.query_messages(
            "SELECT id, user_id, role, content, created_at
             FROM chat_messages
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
            params![user_id, limit as i64],
        )
    }

    /// All of a user's turns in chronological order, for display.
    pub fn list_messages(&self, user_id: i64) -> Result<Vec<ChatMessage>> {
        self.query_messages(
            "SELECT id, user_id, role, content, created_at
             FROM chat_messages
             WHERE user_id = ?1
             ORDER BY created_at ASC, id ASC",
            params![user_id],
        )
    }

    /// Unconditionally delete all turns for a user. Returns the number of
    /// deleted rows. Irreversible; any confirmation step lives upstream.
    pub fn clear_messages(&self, user_id: i64) -> Result<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM chat_messages WHERE user_id = ?1",
                params![user_id],
            )
            .map_err(|e| Error::Database(format!("failed to clear messages: {e}")))?;
        Ok(deleted)
    }

    fn query_messages(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ChatMessage>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare message query: {e}")))?;

        let rows = stmt
            .query_map(params, |row| {
                let role_raw: String = row.get(2)?;
                let role = role_raw.parse::<ChatRole>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?;
                let created_at_raw: String = row.get(4)?;
                Ok(ChatMessage {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    role,
                    content: row.get(3)?,
                    created_at: parse_timestamp(&created_at_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to load messages: {e}")))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(
                row.map_err(|e| Error::Database(format!("failed to read message row: {e}")))?,
            );
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::ChatStore;
    use healthpulse_common::ChatRole;

    fn message_count(store: &ChatStore, user_id: i64) -> i64 {
        store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE user_id = ?1",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn append_turn_creates_ordered_pair() {
        let mut store = ChatStore::in_memory().expect("in-memory store should open");

        let (question, answer) = store
            .append_turn(1, "How am I doing?", "You're doing great.")
            .expect("append should succeed");

        assert_eq!(question.role, ChatRole::User);
        assert_eq!(answer.role, ChatRole::Assistant);
        assert_eq!(question.user_id, answer.user_id);
        assert!(answer.created_at >= question.created_at);
        assert!(answer.id > question.id);

        let messages = store.list_messages(1).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "How am I doing?");
        assert_eq!(messages[1].content, "You're doing great.");
    }

    #[test]
    fn failed_append_leaves_no_partial_pair() {
        let mut store = ChatStore::in_memory().unwrap();

        // Force the second insert of the pair to fail mid-transaction.
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_assistant BEFORE INSERT ON chat_messages
                 WHEN NEW.role = 'assistant'
                 BEGIN SELECT RAISE(ABORT, 'assistant insert rejected'); END;",
            )
            .unwrap();

        let before = message_count(&store, 1);
        let result = store.append_turn(1, "question", "answer");
        assert!(result.is_err());
        assert_eq!(message_count(&store, 1), before);
    }

    #[test]
    fn list_messages_is_chronologically_ascending() {
        let mut store = ChatStore::in_memory().unwrap();
        store.append_turn(1, "first", "first answer").unwrap();
        store.append_turn(1, "second", "second answer").unwrap();

        let messages = store.list_messages(1).unwrap();
        assert_eq!(messages.len(), 4);
        for pair in messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
            assert!(pair[0].id < pair[1].id);
        }
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[3].content, "second answer");
    }

    #[test]
    fn recent_messages_windows_newest_first() {
        let mut store = ChatStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .append_turn(1, &format!("q{i}"), &format!("a{i}"))
                .unwrap();
        }

        let recent = store.recent_messages(1, 6).unwrap();
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].content, "a4");
        assert_eq!(recent[5].content, "q2");

        // Reversing the window restores chronological order for prompts.
        let mut chronological = recent;
        chronological.reverse();
        assert_eq!(chronological[0].content, "q2");
        assert_eq!(chronological[5].content, "a4");
    }

    #[test]
    fn clear_messages_is_scoped_to_one_user() {
        let mut store = ChatStore::in_memory().unwrap();
        store.append_turn(1, "mine", "mine answer").unwrap();
        store.append_turn(2, "theirs", "theirs answer").unwrap();

        let deleted = store.clear_messages(1).unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_messages(1).unwrap().is_empty());
        assert_eq!(store.list_messages(2).unwrap().len(), 2);
    }
}
