use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Selector error at offset {offset}: {message}")]
    Selector { offset: usize, message: String },

    #[error("Observer attachment error: {0}")]
    ObserverAttachment(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Hierarchy error: {0}")]
    Hierarchy(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LookupError {
    /// Whether the error stems from the caller's query text rather than the host
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            LookupError::InvalidQuery(_) | LookupError::Selector { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;
