//! In-memory credential store backed by a JSON file
//!
//! The store owns the username to credential mapping and answers the
//! broker's authentication and authorization questions against it.
//!
//! Lock discipline: the mapping lock is never held across an `.await`.
//! `init` parses a complete replacement before swapping it in, `save`
//! serializes a snapshot taken under the read lock, and password hashing
//! runs on the blocking thread pool.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use topicguard_auth::{AuthError, PasswordHasher};
use tracing::debug;

use crate::config::StoreConfig;
use crate::credentials::{CredentialFile, CredentialRecord};
use crate::error::StoreError;
use crate::events::{AuthEvent, EventSink, TracingSink};
use crate::glob::{MATCH_ALL, TopicPattern};
use crate::session::{ClientSession, PublishPacket, Subscription};

/// Result of a successful [`CredentialStore::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// An existing credentials file was loaded
    Loaded { users: usize },
    /// No readable file; started empty so `save` can create one
    Created,
}

/// A record together with its compiled topic patterns
#[derive(Debug, Clone)]
struct UserEntry {
    record: CredentialRecord,
    publish: TopicPattern,
    subscribe: TopicPattern,
}

impl UserEntry {
    fn new(record: CredentialRecord) -> Result<Self, StoreError> {
        let publish = compile_pattern(&record.authorize_publish)?;
        let subscribe = compile_pattern(&record.authorize_subscribe)?;
        Ok(Self {
            record,
            publish,
            subscribe,
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<TopicPattern, StoreError> {
    TopicPattern::compile(pattern).map_err(|source| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn pattern_or_default(pattern: Option<&str>) -> &str {
    match pattern {
        Some(p) if !p.is_empty() => p,
        _ => MATCH_ALL,
    }
}

type UserMap = HashMap<String, UserEntry>;

/// JSON file credential store and authorizer
pub struct CredentialStore {
    config: StoreConfig,
    hasher: PasswordHasher,
    events: Arc<dyn EventSink>,
    /// `None` until the first successful `init`
    users: RwLock<Option<UserMap>>,
}

impl CredentialStore {
    /// Create an uninitialized store
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            hasher: PasswordHasher::default(),
            events: Arc::new(TracingSink),
            users: RwLock::new(None),
        }
    }

    /// Use a specific password hasher
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Report events to the given sink instead of `tracing`
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn path_display(&self) -> String {
        self.config.credentials.display().to_string()
    }

    /// Whether a mapping has been loaded or created
    pub fn is_initialized(&self) -> bool {
        self.users.read().is_some()
    }

    /// Number of configured users (zero when uninitialized)
    pub fn user_count(&self) -> usize {
        self.users.read().as_ref().map_or(0, |users| users.len())
    }

    /// Sorted list of configured usernames
    pub fn list_users(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .users
            .read()
            .as_ref()
            .map(|users| users.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Look up the stored record for a user
    pub fn get_user(&self, username: &str) -> Option<CredentialRecord> {
        self.users
            .read()
            .as_ref()
            .and_then(|users| users.get(username))
            .map(|entry| entry.record.clone())
    }

    /// Load the credentials file, replacing the in-memory mapping
    ///
    /// When the file cannot be read or parsed and `force_create` is false,
    /// the current state is left untouched and the failure is returned. An
    /// uninitialized store denies everything. With `force_create` the store
    /// starts from an empty mapping that a later `save` writes out.
    pub async fn init(&self, force_create: bool) -> Result<InitOutcome, StoreError> {
        let path = self.config.credentials.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let file = CredentialFile::load(&path)?;
            file.into_records()
                .map(|(username, record)| Ok((username, UserEntry::new(record)?)))
                .collect::<Result<UserMap, StoreError>>()
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(format!("Task join error: {}", e))))
        .and_then(|result| result);

        match loaded {
            Ok(users) => {
                let count = users.len();
                *self.users.write() = Some(users);
                self.events.record(&AuthEvent::CredentialsLoaded {
                    path: self.path_display(),
                    users: count,
                });
                Ok(InitOutcome::Loaded { users: count })
            }
            Err(e) => {
                let reason = e.to_string();
                self.events.record(&AuthEvent::CredentialsLoadFailed {
                    path: self.path_display(),
                    reason: reason.clone(),
                });

                if !force_create {
                    return Err(StoreError::Load {
                        path: self.path_display(),
                        reason,
                    });
                }

                *self.users.write() = Some(HashMap::new());
                self.events.record(&AuthEvent::CredentialsCreated {
                    path: self.path_display(),
                });
                Ok(InitOutcome::Created)
            }
        }
    }

    /// Write the whole mapping to the credentials file
    ///
    /// Returns the number of users written. A failed save leaves the
    /// in-memory mapping untouched.
    pub async fn save(&self) -> Result<usize, StoreError> {
        let snapshot = {
            let guard = self.users.read();
            let users = guard.as_ref().ok_or(StoreError::Uninitialized)?;
            CredentialFile::from_records(
                users
                    .iter()
                    .map(|(username, entry)| (username.clone(), entry.record.clone())),
            )
        };

        let count = snapshot.len();
        let path = self.config.credentials.clone();

        tokio::task::spawn_blocking(move || snapshot.save(&path))
            .await
            .map_err(|e| {
                StoreError::Io(std::io::Error::other(format!("Task join error: {}", e)))
            })??;

        self.events.record(&AuthEvent::CredentialsSaved {
            path: self.path_display(),
            users: count,
        });
        Ok(count)
    }

    /// Add or replace a user
    ///
    /// Missing or empty patterns default to `**`. The password is always
    /// rehashed with a fresh salt. Returns the record that was replaced, if
    /// any. Changes are not persisted until `save`.
    pub async fn add_user(
        &self,
        username: &str,
        password: &str,
        authorize_publish: Option<&str>,
        authorize_subscribe: Option<&str>,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        if username.is_empty() {
            return Err(StoreError::InvalidInput("username cannot be empty".to_string()));
        }
        if password.is_empty() {
            return Err(StoreError::InvalidInput("password cannot be empty".to_string()));
        }
        if !self.is_initialized() {
            return Err(StoreError::Uninitialized);
        }

        let publish = compile_pattern(pattern_or_default(authorize_publish))?;
        let subscribe = compile_pattern(pattern_or_default(authorize_subscribe))?;

        let hasher = self.hasher.clone();
        let password = password.as_bytes().to_vec();
        let hashed = tokio::task::spawn_blocking(move || hasher.generate_hash_password(&password))
            .await
            .map_err(|e| AuthError::TaskFailed(e.to_string()))??;

        let entry = UserEntry {
            record: CredentialRecord {
                password: hashed,
                authorize_publish: publish.as_str().to_string(),
                authorize_subscribe: subscribe.as_str().to_string(),
            },
            publish,
            subscribe,
        };

        let previous = {
            let mut guard = self.users.write();
            let users = guard.as_mut().ok_or(StoreError::Uninitialized)?;
            users.insert(username.to_string(), entry)
        };

        self.events.record(&AuthEvent::UserAdded {
            username: username.to_string(),
            replaced: previous.is_some(),
        });
        Ok(previous.map(|entry| entry.record))
    }

    /// Remove a user, returning its record if it existed
    pub fn remove_user(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let removed = {
            let mut guard = self.users.write();
            let users = guard.as_mut().ok_or(StoreError::Uninitialized)?;
            users.remove(username)
        };

        if removed.is_some() {
            self.events.record(&AuthEvent::UserRemoved {
                username: username.to_string(),
            });
        }
        Ok(removed.map(|entry| entry.record))
    }

    /// Authenticate a connecting client
    ///
    /// Missing credentials and unknown users yield `Ok(false)`, the same as
    /// a wrong password. `Err` is reserved for hashing faults.
    pub async fn authenticate(
        &self,
        client: &ClientSession,
        username: Option<&str>,
        password: Option<&[u8]>,
    ) -> Result<bool, AuthError> {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            (username, _) => {
                self.record_authentication(client, username, false);
                return Ok(false);
            }
        };

        let stored = self
            .users
            .read()
            .as_ref()
            .and_then(|users| users.get(username))
            .map(|entry| entry.record.password.clone());

        let Some(stored) = stored else {
            self.record_authentication(client, Some(username), false);
            return Ok(false);
        };

        client.set_username(username);

        let hasher = self.hasher.clone();
        let password = password.to_vec();
        let result = tokio::task::spawn_blocking(move || hasher.verify_password(&stored, &password))
            .await
            .map_err(|e| AuthError::TaskFailed(e.to_string()))
            .and_then(|verified| verified);

        match &result {
            Ok(success) => self.record_authentication(client, Some(username), *success),
            Err(e) => self.events.record(&AuthEvent::AuthenticationFailed {
                client_id: client.id().to_string(),
                username: username.to_string(),
                error: e.to_string(),
            }),
        }
        result
    }

    fn record_authentication(&self, client: &ClientSession, username: Option<&str>, success: bool) {
        self.events.record(&AuthEvent::Authenticated {
            client_id: client.id().to_string(),
            username: username.map(str::to_string),
            success,
        });
    }

    /// Find the pattern selected by `pick` for the client's authenticated user
    fn client_allows(
        &self,
        client: &ClientSession,
        topic: &str,
        pick: impl Fn(&UserEntry) -> &TopicPattern,
    ) -> bool {
        let Some(username) = client.username() else {
            return false;
        };

        self.users
            .read()
            .as_ref()
            .and_then(|users| users.get(&username))
            .is_some_and(|entry| pick(entry).matches(topic))
    }

    /// Authorize a publish
    ///
    /// Denial is an error which the broker treats as a hard rejection.
    pub fn authorize_publish(
        &self,
        client: &ClientSession,
        packet: &PublishPacket,
    ) -> Result<(), AuthError> {
        if self.client_allows(client, &packet.topic, |entry| &entry.publish) {
            return Ok(());
        }

        self.events.record(&AuthEvent::PublishDenied {
            client_id: client.id().to_string(),
            username: client.username(),
            topic: packet.topic.clone(),
        });
        Err(AuthError::PublishNotAuthorized {
            topic: packet.topic.clone(),
        })
    }

    /// Authorize a subscription
    ///
    /// Returns the request unchanged when permitted. Denial is a `None`
    /// grant, which the broker treats as "do not subscribe", not an error.
    pub fn authorize_subscribe(
        &self,
        client: &ClientSession,
        subscription: Subscription,
    ) -> Option<Subscription> {
        if self.client_allows(client, &subscription.topic, |entry| &entry.subscribe) {
            return Some(subscription);
        }

        debug!("Dropping subscription to {}", subscription.topic);
        self.events.record(&AuthEvent::SubscribeDenied {
            client_id: client.id().to_string(),
            username: client.username(),
            topic: subscription.topic,
        });
        None
    }
}
