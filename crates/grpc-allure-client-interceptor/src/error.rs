use thiserror::Error;

/// Errors raised by a report lifecycle
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Step already stopped: {0}")]
    StepAlreadyStopped(String),

    #[error("Lifecycle state poisoned: {0}")]
    Poisoned(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors raised while rendering a message in structured form
///
/// The formatter never surfaces these from `format`; they are only returned by
/// `ProtoFormatter::try_format`.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Message does not match its descriptor: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("JSON rendering failed: {0}")]
    JsonError(#[from] serde_json::Error),
}
