use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode engine response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

impl From<EngineError> for prodsearch_core::Error {
    fn from(err: EngineError) -> Self {
        prodsearch_core::Error::Engine(err.to_string())
    }
}
