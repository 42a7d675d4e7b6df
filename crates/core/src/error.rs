use thiserror::Error;

/// Failure taxonomy for the matching pipeline. Per-record and per-probe
/// failures are isolated by the callers; `Configuration` is fatal before any
/// remote call is attempted.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validation failure: {0}")]
    Validation(String),
    #[error("embedding failure: {0}")]
    Embedding(String),
    #[error("vector index failure: {0}")]
    Index(String),
    #[error("generation failure: {0}")]
    Generation(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<anyhow::Error> for PipelineError {
    fn from(value: anyhow::Error) -> Self {
        Self::Validation(value.to_string())
    }
}
