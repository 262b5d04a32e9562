//! Salted password hashing
//!
//! Passwords are stretched with Argon2id using a fresh random salt per user.
//! Only the hex-encoded salt and digest are ever stored.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Digest length in bytes
pub const HASH_LEN: usize = 32;

/// Salt and digest pair for a single password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPassword {
    /// Hex-encoded random salt
    pub salt: String,
    /// Hex-encoded Argon2id digest of (password, salt)
    pub hash: String,
}

/// Argon2id password hasher
///
/// The cost parameters are fixed for the lifetime of the hasher; records
/// produced by one set of parameters only verify under the same set.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with explicit cost parameters
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Create a hasher from raw Argon2 cost values
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, Some(HASH_LEN))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn derive(&self, password: &[u8], salt: &[u8]) -> Result<[u8; HASH_LEN], AuthError> {
        let mut output = [0u8; HASH_LEN];
        self.argon2().hash_password_into(password, salt, &mut output)?;
        Ok(output)
    }

    /// Hash a password with a freshly generated salt
    pub fn generate_hash_password(&self, password: &[u8]) -> Result<HashedPassword, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let hash = self.derive(password, &salt)?;

        Ok(HashedPassword {
            salt: hex::encode(salt),
            hash: hex::encode(hash),
        })
    }

    /// Verify a password against a stored salt and digest
    ///
    /// Returns `Ok(false)` for a wrong password. A record whose salt or
    /// digest cannot be decoded is an error, not a failed match.
    pub fn verify_password(
        &self,
        record: &HashedPassword,
        password: &[u8],
    ) -> Result<bool, AuthError> {
        let salt = hex::decode(&record.salt)
            .map_err(|e| AuthError::MalformedRecord(format!("salt: {}", e)))?;
        let expected = hex::decode(&record.hash)
            .map_err(|e| AuthError::MalformedRecord(format!("hash: {}", e)))?;

        if expected.len() != HASH_LEN {
            return Err(AuthError::MalformedRecord(format!(
                "hash is {} bytes, expected {}",
                expected.len(),
                HASH_LEN
            )));
        }

        let computed = self.derive(password, &salt)?;
        let matched = constant_time_eq(&computed, &expected);

        debug!("Password verification completed (matched: {})", matched);
        Ok(matched)
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_cost(8, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();

        let hashed = hasher.generate_hash_password(b"secret").unwrap();

        assert!(hasher.verify_password(&hashed, b"secret").unwrap());
        assert!(!hasher.verify_password(&hashed, b"wrong").unwrap());
        assert!(!hasher.verify_password(&hashed, b"").unwrap());
    }

    #[test]
    fn test_salt_is_fresh_per_call() {
        let hasher = fast_hasher();

        let first = hasher.generate_hash_password(b"secret").unwrap();
        let second = hasher.generate_hash_password(b"secret").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert_eq!(first.salt.len(), SALT_LEN * 2);
        assert_eq!(first.hash.len(), HASH_LEN * 2);
    }

    #[test]
    fn test_parameters_must_match() {
        let hashed = fast_hasher().generate_hash_password(b"secret").unwrap();
        let other = PasswordHasher::with_cost(16, 1, 1).unwrap();

        assert!(!other.verify_password(&hashed, b"secret").unwrap());
    }

    #[test]
    fn test_malformed_record() {
        let hasher = fast_hasher();
        let mut hashed = hasher.generate_hash_password(b"secret").unwrap();

        hashed.salt = "not-hex".to_string();
        let result = hasher.verify_password(&hashed, b"secret");
        assert!(matches!(result, Err(AuthError::MalformedRecord(_))));

        let mut truncated = hasher.generate_hash_password(b"secret").unwrap();
        truncated.hash.truncate(10);
        let result = hasher.verify_password(&truncated, b"secret");
        assert!(matches!(result, Err(AuthError::MalformedRecord(_))));
    }

    #[test]
    fn test_short_salt_is_hash_error() {
        let hasher = fast_hasher();
        let record = HashedPassword {
            salt: "0011".to_string(),
            hash: hex::encode([0u8; HASH_LEN]),
        };

        let result = hasher.verify_password(&record, b"secret");
        assert!(matches!(result, Err(AuthError::PasswordHash(_))));
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = PasswordHasher::with_cost(0, 0, 0);
        assert!(matches!(result, Err(AuthError::PasswordHash(_))));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
