//! Credential store error types

use thiserror::Error;
use topicguard_auth::AuthError;

use crate::glob::PatternError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Credential store is not initialized")]
    Uninitialized,

    #[error("Unable to load credentials file {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}
