#[derive(Debug, thiserror::Error)]
pub enum ToolServerError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("store: {0}")]
    Store(#[from] pf_store::StoreError),

    #[error("state machine: {0}")]
    StateMachine(#[from] pf_statemachine::StateMachineError),
}

pub type Result<T> = std::result::Result<T, ToolServerError>;
