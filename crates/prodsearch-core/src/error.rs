use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Result size {size} is outside 1..={max}")]
    InvalidSize { size: usize, max: usize },

    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("Suggestion prefix must not be empty")]
    EmptyPrefix,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index engine failed: {0}")]
    Engine(String),

    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded { stage: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
