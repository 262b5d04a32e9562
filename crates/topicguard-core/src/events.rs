//! Structured authorization events
//!
//! The credential store reports what it does through an injected
//! [`EventSink`] instead of writing to a global output channel.
//! [`TracingSink`] forwards every event to `tracing`.

use std::fmt;

use tracing::{debug, info, warn};

/// Something the credential store did or decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    CredentialsLoaded { path: String, users: usize },
    CredentialsLoadFailed { path: String, reason: String },
    CredentialsCreated { path: String },
    CredentialsSaved { path: String, users: usize },
    UserAdded { username: String, replaced: bool },
    UserRemoved { username: String },
    Authenticated {
        client_id: String,
        username: Option<String>,
        success: bool,
    },
    AuthenticationFailed {
        client_id: String,
        username: String,
        error: String,
    },
    PublishDenied {
        client_id: String,
        username: Option<String>,
        topic: String,
    },
    SubscribeDenied {
        client_id: String,
        username: Option<String>,
        topic: String,
    },
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthEvent::CredentialsLoaded { path, users } => {
                write!(f, "loaded {} users from {}", users, path)
            }
            AuthEvent::CredentialsLoadFailed { path, reason } => {
                write!(f, "unable to load credentials file {}: {}", path, reason)
            }
            AuthEvent::CredentialsCreated { path } => {
                write!(f, "creating new credentials file {}", path)
            }
            AuthEvent::CredentialsSaved { path, users } => {
                write!(f, "saved {} users to {}", users, path)
            }
            AuthEvent::UserAdded { username, replaced } => {
                let verb = if *replaced { "updated" } else { "added" };
                write!(f, "user {} {}", username, verb)
            }
            AuthEvent::UserRemoved { username } => write!(f, "user {} removed", username),
            AuthEvent::Authenticated {
                client_id,
                username,
                success,
            } => write!(
                f,
                "client {} authentication as {} {}",
                client_id,
                username.as_deref().unwrap_or("<none>"),
                if *success { "succeeded" } else { "rejected" }
            ),
            AuthEvent::AuthenticationFailed {
                client_id,
                username,
                error,
            } => write!(
                f,
                "client {} authentication as {} failed: {}",
                client_id, username, error
            ),
            AuthEvent::PublishDenied {
                client_id,
                username,
                topic,
            } => write!(
                f,
                "client {} ({}) not authorized to publish to {}",
                client_id,
                username.as_deref().unwrap_or("<unauthenticated>"),
                topic
            ),
            AuthEvent::SubscribeDenied {
                client_id,
                username,
                topic,
            } => write!(
                f,
                "client {} ({}) not authorized to subscribe to {}",
                client_id,
                username.as_deref().unwrap_or("<unauthenticated>"),
                topic
            ),
        }
    }
}

/// Receiver for [`AuthEvent`]s
pub trait EventSink: Send + Sync {
    fn record(&self, event: &AuthEvent);
}

/// Event sink that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &AuthEvent) {
        match event {
            AuthEvent::CredentialsLoadFailed { .. } | AuthEvent::AuthenticationFailed { .. } => {
                warn!("{}", event)
            }
            AuthEvent::CredentialsLoaded { .. }
            | AuthEvent::CredentialsCreated { .. }
            | AuthEvent::CredentialsSaved { .. }
            | AuthEvent::UserAdded { .. }
            | AuthEvent::UserRemoved { .. } => info!("{}", event),
            AuthEvent::Authenticated { .. }
            | AuthEvent::PublishDenied { .. }
            | AuthEvent::SubscribeDenied { .. } => debug!("{}", event),
        }
    }
}

/// Event sink that keeps every event in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: parking_lot::Mutex<Vec<AuthEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn record(&self, event: &AuthEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_authenticated() {
        let event = AuthEvent::Authenticated {
            client_id: "c1".to_string(),
            username: Some("alice".to_string()),
            success: true,
        };
        assert_eq!(
            event.to_string(),
            "client c1 authentication as alice succeeded"
        );
    }

    #[test]
    fn test_display_denials() {
        let event = AuthEvent::PublishDenied {
            client_id: "c1".to_string(),
            username: None,
            topic: "admin/cmd".to_string(),
        };
        assert_eq!(
            event.to_string(),
            "client c1 (<unauthenticated>) not authorized to publish to admin/cmd"
        );

        let event = AuthEvent::UserAdded {
            username: "bob".to_string(),
            replaced: true,
        };
        assert_eq!(event.to_string(), "user bob updated");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::default();
        sink.record(&AuthEvent::UserRemoved {
            username: "bob".to_string(),
        });
        TracingSink.record(&AuthEvent::UserRemoved {
            username: "bob".to_string(),
        });

        assert_eq!(sink.events().len(), 1);
    }
}
