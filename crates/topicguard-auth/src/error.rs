//! Authentication and authorization error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Malformed credential record: {0}")]
    MalformedRecord(String),

    #[error("Publish not authorized: {topic}")]
    PublishNotAuthorized { topic: String },

    #[error("Authorization task failed: {0}")]
    TaskFailed(String),
}

impl AuthError {
    /// Whether this error signals an internal fault rather than a denial
    pub fn is_internal(&self) -> bool {
        !matches!(self, AuthError::PublishNotAuthorized { .. })
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
