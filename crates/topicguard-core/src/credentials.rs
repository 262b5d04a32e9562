//! Durable credential file format
//!
//! The file is a JSON object keyed by username:
//!
//! ```json
//! {
//!   "alice": {
//!     "salt": "<hex>",
//!     "hash": "<hex>",
//!     "authorizePublish": "**",
//!     "authorizeSubscribe": "**"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use topicguard_auth::HashedPassword;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::StoreError;
use crate::glob::MATCH_ALL;

/// Stored credentials and topic permissions for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(flatten)]
    pub password: HashedPassword,
    /// Glob pattern for topics this user may publish to
    #[serde(rename = "authorizePublish", default = "default_pattern")]
    pub authorize_publish: String,
    /// Glob pattern for topic filters this user may subscribe to
    #[serde(rename = "authorizeSubscribe", default = "default_pattern")]
    pub authorize_subscribe: String,
}

impl CredentialRecord {
    /// Replace empty patterns with the match-everything default
    fn normalize(mut self) -> Self {
        if self.authorize_publish.is_empty() {
            self.authorize_publish = default_pattern();
        }
        if self.authorize_subscribe.is_empty() {
            self.authorize_subscribe = default_pattern();
        }
        self
    }
}

fn default_pattern() -> String {
    MATCH_ALL.to_string()
}

/// Serialized form of the whole credential mapping
///
/// Users are kept sorted so that saving an unchanged mapping reproduces the
/// same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialFile {
    users: BTreeMap<String, CredentialRecord>,
}

impl CredentialFile {
    /// Build a file from username/record pairs
    pub fn from_records(records: impl IntoIterator<Item = (String, CredentialRecord)>) -> Self {
        Self {
            users: records.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Consume the file, yielding username/record pairs
    pub fn into_records(self) -> impl Iterator<Item = (String, CredentialRecord)> {
        self.users.into_iter()
    }

    /// Parse the JSON representation
    pub fn from_json(content: &str) -> Result<Self, StoreError> {
        let file: CredentialFile = serde_json::from_str(content)?;
        Ok(Self::from_records(
            file.into_records()
                .map(|(username, record)| (username, record.normalize())),
        ))
    }

    /// Render the human-readable JSON representation
    pub fn to_json_pretty(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and parse a credential file
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let file = Self::from_json(&content)?;
        debug!("Parsed {} users from {:?}", file.len(), path);
        Ok(file)
    }

    /// Write the file atomically
    ///
    /// Content goes to a temporary file in the destination directory which is
    /// then renamed over the target, so a failed write leaves the previous
    /// file intact.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = self.to_json_pretty()?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp_file = tempfile::NamedTempFile::new_in(parent)?;

        {
            let mut file = temp_file.as_file();
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        // Owner read/write only: the file holds password hashes
        #[cfg(unix)]
        {
            let mut perms = temp_file.as_file().metadata()?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(temp_file.path(), perms)?;
        }

        temp_file.persist(path).map_err(|e| StoreError::Io(e.error))?;

        debug!("Wrote {} users to {:?}", self.len(), path);
        Ok(())
    }
}
