//! Authorizer configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the JSON credential store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the credentials file
    #[serde(default = "default_credentials_path")]
    pub credentials: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials_path(),
        }
    }
}

impl StoreConfig {
    pub fn new(credentials: impl Into<PathBuf>) -> Self {
        Self {
            credentials: credentials.into(),
        }
    }

    /// Human-readable description of the available options
    pub fn describe_options() -> &'static str {
        "Basic JSON file authorizer.\n\n\
         available options are:\n\
         \tcredentials:\tdefine path to credentials file"
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("./credentials.json")
}
