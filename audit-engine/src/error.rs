use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Security log delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Security event serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("No async runtime available for security log delivery")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, AuditError>;
