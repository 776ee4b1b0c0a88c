use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use pf_domain::model::{FieldValue, Message, Session, SessionStatus};

use crate::backoff::{is_retryable, WriteBackoff};
use crate::error::{Result, StoreError};
use crate::rows::{
    field_value_from_row, message_from_row, message_role_str, message_type_str, session_from_row,
    session_status_str,
};
use crate::schema;

/// Thin transactional wrapper around a single sqlite connection.
///
/// Mirrors the `Arc<Mutex<Connection>>` + `spawn_blocking` shape used
/// elsewhere in the corpus for embedding a synchronous sqlite driver in an
/// async server: the mutex serializes access, but each hold is only as
/// long as one query or one transaction.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
    backoff: WriteBackoff,
}

impl SessionStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Sqlite(rusqlite::Error::InvalidPath(
                    format!("{}: {e}", parent.display()).into(),
                ))
            })?;
        }
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            schema::apply(&conn)?;
            Ok(conn)
        })
        .await??;

        tracing::info!("session store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            backoff: WriteBackoff::default(),
        })
    }

    /// An in-memory store with no backing file — used by tests across
    /// the workspace and by `pf-gateway doctor` smoke checks.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            backoff: WriteBackoff::default(),
        })
    }

    /// Run a closure against the connection, retrying with backoff when
    /// sqlite reports `SQLITE_BUSY`/`SQLITE_LOCKED` (spec §7's
    /// `StoreWriteConflict`). Exhausting the retry budget surfaces
    /// [`StoreError::WriteConflict`] so the caller can tell a plain
    /// sqlite error from one that was already retried.
    async fn run_blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: Fn(&mut Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        let backoff = self.backoff.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut attempt = 0;
            loop {
                let outcome = {
                    let mut conn = conn.lock().expect("session store mutex poisoned");
                    f(&mut conn)
                };
                match outcome {
                    Err(e) if is_retryable(&e) && !backoff.should_give_up(attempt) => {
                        let delay = backoff.delay_for_attempt(attempt);
                        tracing::warn!(attempt, ?delay, "session store write conflict, retrying");
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    Err(e) if is_retryable(&e) => {
                        break Err(StoreError::WriteConflict(e.to_string()));
                    }
                    other => break other.map_err(StoreError::from),
                }
            }
        })
        .await?;
        result
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Session
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn create_session(
        &self,
        user_id: &str,
        operator_id: &str,
        initial_phase_id: &str,
    ) -> Result<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let session = Session {
            id,
            user_id: user_id.to_owned(),
            operator_id: operator_id.to_owned(),
            status: SessionStatus::Active,
            current_phase_id: initial_phase_id.to_owned(),
            current_phase_entered_at: now,
            start_time: now,
            created_at: now,
            updated_at: now,
        };
        let row = session.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions
                    (id, user_id, operator_id, status, current_phase_id,
                     current_phase_entered_at, start_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.id,
                    row.user_id,
                    row.operator_id,
                    session_status_str(row.status),
                    row.current_phase_id,
                    row.current_phase_entered_at.to_rfc3339(),
                    row.start_time.to_rfc3339(),
                    row.created_at.to_rfc3339(),
                    row.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        tracing::info!(session_id = %session.id, phase = %session.current_phase_id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let id = session_id.to_owned();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id],
                session_from_row,
            )
            .optional()
        })
        .await
    }

    async fn require_active(&self, session_id: &str) -> Result<Session> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_owned()))?;
        if session.is_terminal() {
            return Err(StoreError::SessionCompleted(session_id.to_owned()));
        }
        Ok(session)
    }

    pub async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        self.require_active(session_id).await?;
        let id = session_id.to_owned();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![session_status_str(status), Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await
    }

    /// Upsert field values and advance the phase, all inside one
    /// transaction, so readers never observe "fields collected but phase
    /// not yet advanced".
    pub async fn apply_transition(
        &self,
        session_id: &str,
        values: &[FieldValue],
        new_phase_id: &str,
    ) -> Result<()> {
        self.require_active(session_id).await?;
        let id = session_id.to_owned();
        let values = values.to_vec();
        let new_phase_id = new_phase_id.to_owned();
        let now = Utc::now();
        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            for v in &values {
                upsert_field_value_tx(&tx, &id, v)?;
            }
            tx.execute(
                "UPDATE sessions
                    SET current_phase_id = ?1, current_phase_entered_at = ?2, updated_at = ?3
                  WHERE id = ?4",
                params![new_phase_id, now.to_rfc3339(), now.to_rfc3339(), id],
            )?;
            tx.commit()
        })
        .await
    }

    /// Upsert field values without a phase change (the not-ready-yet path
    /// of `collect_structured_data`).
    pub async fn upsert_field_values(&self, session_id: &str, values: &[FieldValue]) -> Result<()> {
        self.require_active(session_id).await?;
        let id = session_id.to_owned();
        let values = values.to_vec();
        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            for v in &values {
                upsert_field_value_tx(&tx, &id, v)?;
            }
            tx.execute(
                "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            tx.commit()
        })
        .await
    }

    pub async fn complete_session(&self, session_id: &str) -> Result<()> {
        self.require_active(session_id).await?;
        let id = session_id.to_owned();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'completed', updated_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await?;
        tracing::info!(session_id, "session completed");
        Ok(())
    }

    pub async fn list_field_values(&self, session_id: &str) -> Result<Vec<FieldValue>> {
        let id = session_id.to_owned();
        self.run_blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM field_values WHERE session_id = ?1")?;
            let rows = stmt.query_map(params![id], field_value_from_row)?;
            rows.collect()
        })
        .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Messages
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn append_message(&self, message: &Message) -> Result<()> {
        self.require_active(&message.session_id).await?;
        let m = message.clone();
        self.run_blocking(move |conn| {
            let metadata = m.metadata.as_ref().map(|v| v.to_string());
            conn.execute(
                "INSERT INTO messages
                    (id, session_id, role, content, message_type, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    m.id,
                    m.session_id,
                    message_role_str(m.role),
                    m.content,
                    message_type_str(m.message_type),
                    metadata,
                    m.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Patch a tool_call row's metadata in place — used to move a
    /// tool_call Message from `executing` to `completed`/`failed`.
    pub async fn patch_message_metadata(
        &self,
        message_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        let id = message_id.to_owned();
        let metadata = metadata.to_string();
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE messages SET metadata = ?1 WHERE id = ?2",
                params![metadata, id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let id = session_id.to_owned();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM messages WHERE session_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![id], message_from_row)?;
            rows.collect()
        })
        .await
    }

    /// Most recent `limit` messages, oldest-first — for the Conductor's
    /// initial snapshot (spec §4.E).
    pub async fn recent_messages(&self, session_id: &str, limit: u32) -> Result<Vec<Message>> {
        let id = session_id.to_owned();
        let mut rows = self
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM messages WHERE session_id = ?1
                     ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![id, limit], message_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        rows.reverse();
        Ok(rows)
    }

    /// Count user messages with `created_at >= since` — backs
    /// `minimum_turns_met`'s "since most recent entry into this phase"
    /// semantics.
    pub async fn count_user_messages_since(
        &self,
        session_id: &str,
        since: chrono::DateTime<Utc>,
    ) -> Result<u32> {
        let id = session_id.to_owned();
        let since = since.to_rfc3339();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                  WHERE session_id = ?1 AND role = 'user' AND created_at >= ?2",
                params![id, since],
                |row| row.get(0),
            )
        })
        .await
    }

    /// `PRAGMA wal_checkpoint` — the periodic flush task independent of
    /// the Backup Scheduler's object-store snapshot.
    pub async fn checkpoint(&self) -> Result<()> {
        self.run_blocking(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await?;
        tracing::debug!("session store checkpointed");
        Ok(())
    }

    /// Snapshot the whole database file for the Backup Scheduler. Uses
    /// sqlite's online backup API via `VACUUM INTO`, the simplest
    /// consistent-snapshot primitive available without a second
    /// connection handle.
    pub async fn snapshot_to(&self, dest: &Path) -> Result<u64> {
        let dest = dest.to_path_buf();
        let dest_for_metadata = dest.clone();
        self.run_blocking(move |conn| {
            let dest_str = dest.to_string_lossy().to_string();
            conn.execute("VACUUM INTO ?1", params![dest_str])?;
            Ok(())
        })
        .await?;
        let bytes = std::fs::metadata(&dest_for_metadata).map(|m| m.len()).unwrap_or(0);
        Ok(bytes)
    }
}

fn upsert_field_value_tx(
    tx: &rusqlite::Transaction,
    session_id: &str,
    value: &FieldValue,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO field_values
            (session_id, field_name, value, collected_in_phase, type_tag, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(session_id, field_name) DO UPDATE SET
            value = excluded.value,
            collected_in_phase = excluded.collected_in_phase,
            type_tag = excluded.type_tag,
            updated_at = excluded.updated_at",
        params![
            session_id,
            value.field_name,
            value.value.to_string(),
            value.collected_in_phase,
            value.type_tag,
            value.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_domain::model::{detect_type_tag, MessageRole};

    fn field(session_id: &str, name: &str, value: serde_json::Value, phase: &str) -> FieldValue {
        FieldValue {
            session_id: session_id.to_owned(),
            field_name: name.to_owned(),
            type_tag: detect_type_tag(&value).to_owned(),
            value,
            collected_in_phase: phase.to_owned(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_get_session() {
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("user-1", "op-1", "A").await.unwrap();
        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.current_phase_id, "A");
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn apply_transition_is_atomic() {
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("user-1", "op-1", "A").await.unwrap();
        let values = vec![field(&session.id, "name", serde_json::json!("Alex"), "A")];
        store
            .apply_transition(&session.id, &values, "B")
            .await
            .unwrap();

        let updated = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(updated.current_phase_id, "B");
        let stored_values = store.list_field_values(&session.id).await.unwrap();
        assert_eq!(stored_values.len(), 1);
        assert_eq!(stored_values[0].value, serde_json::json!("Alex"));
    }

    #[tokio::test]
    async fn upsert_most_recent_write_wins() {
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("user-1", "op-1", "A").await.unwrap();
        store
            .upsert_field_values(&session.id, &[field(&session.id, "name", serde_json::json!("Alex"), "A")])
            .await
            .unwrap();
        store
            .upsert_field_values(&session.id, &[field(&session.id, "name", serde_json::json!("Alexandra"), "A")])
            .await
            .unwrap();

        let values = store.list_field_values(&session.id).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, serde_json::json!("Alexandra"));
    }

    #[tokio::test]
    async fn completed_session_rejects_further_writes() {
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("user-1", "op-1", "C").await.unwrap();
        store.complete_session(&session.id).await.unwrap();

        let result = store
            .append_message(&Message::regular(&session.id, MessageRole::User, "hi"))
            .await;
        assert!(matches!(result, Err(StoreError::SessionCompleted(_))));
    }

    #[tokio::test]
    async fn count_user_messages_since_scopes_to_timestamp() {
        let store = SessionStore::open_in_memory().await.unwrap();
        let session = store.create_session("user-1", "op-1", "A").await.unwrap();
        store
            .append_message(&Message::regular(&session.id, MessageRole::User, "hi"))
            .await
            .unwrap();
        store
            .append_message(&Message::regular(&session.id, MessageRole::Assistant, "hello"))
            .await
            .unwrap();

        let far_past = Utc::now() - chrono::Duration::days(1);
        let far_future = Utc::now() + chrono::Duration::days(1);

        assert_eq!(
            store.count_user_messages_since(&session.id, far_past).await.unwrap(),
            1
        );
        assert_eq!(
            store.count_user_messages_since(&session.id, far_future).await.unwrap(),
            0
        );
    }
}
