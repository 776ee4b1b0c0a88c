#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task join: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("session {0} not found")]
    SessionNotFound(String),

    /// Write rejected: invariant 4 — a completed session accepts no
    /// further Messages or FieldValues.
    #[error("session {0} is completed and accepts no further writes")]
    SessionCompleted(String),

    /// The connection stayed busy/locked through every retry attempt.
    #[error("store write conflict: {0}")]
    WriteConflict(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
