//! topicguard password hashing and authorization errors
//!
//! This crate provides salted Argon2id password hashing with constant-time
//! verification, plus the error type shared by every broker-facing decision.

pub mod error;
pub mod password;

pub use error::AuthError;
pub use password::{HashedPassword, PasswordHasher, constant_time_eq};
