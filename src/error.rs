use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    /// Business-logic storage errors (bad row, lock poisoned, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Memory not found: {0}")]
    MemoryNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Weighted fusion weights must sum to 1.0 (+/- tolerance).
    #[error("Invalid strategy weights: sum is {sum:.4}, expected 1.0")]
    InvalidWeights { sum: f64 },

    #[error("Invalid time expression: '{0}' (expected '<integer> <hour|day|week|month>[s]')")]
    InvalidTimeExpression(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw database errors from rusqlite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Date parse errors from chrono
    #[error("Date parse error: {0}")]
    DateParse(#[from] chrono::ParseError),
}

impl RecallError {
    /// True for the two cancellation flavours.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

pub type RecallResult<T> = Result<T, RecallError>;
