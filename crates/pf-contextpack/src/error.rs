#[derive(Debug, thiserror::Error)]
pub enum ContextPackError {
    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("store: {0}")]
    Store(#[from] pf_store::StoreError),
}

pub type Result<T> = std::result::Result<T, ContextPackError>;
