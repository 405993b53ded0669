use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Profile not found for subject {0}")]
    ProfileNotFound(Uuid),

    #[error("Profile store returned profile {actual} for subject {expected}")]
    ProfileMismatch { expected: Uuid, actual: Uuid },

    #[error("Profile store unavailable: {0}")]
    ProfileStoreUnavailable(String),

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
