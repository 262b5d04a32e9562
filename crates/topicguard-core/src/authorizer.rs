//! Authorizer trait

use async_trait::async_trait;
use topicguard_auth::AuthError;

use crate::session::{ClientSession, PublishPacket, Subscription};
use crate::store::CredentialStore;

/// Decision provider for the broker's authentication and authorization hooks
///
/// Implementations must tolerate a caller that stops waiting for a result.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Decide whether a connecting client may log in
    ///
    /// `Ok(false)` rejects the login; `Err` signals an internal fault.
    async fn authenticate(
        &self,
        client: &ClientSession,
        username: Option<&str>,
        password: Option<&[u8]>,
    ) -> Result<bool, AuthError>;

    /// Permit (`Ok`) or reject (`Err`) a publish
    ///
    /// Topic checks never block, so the hooks complete them inline.
    fn authorize_publish(
        &self,
        client: &ClientSession,
        packet: &PublishPacket,
    ) -> Result<(), AuthError>;

    /// Grant a subscription by returning it, or drop it with `Ok(None)`
    fn authorize_subscribe(
        &self,
        client: &ClientSession,
        subscription: Subscription,
    ) -> Result<Option<Subscription>, AuthError>;
}

#[async_trait]
impl Authorizer for CredentialStore {
    async fn authenticate(
        &self,
        client: &ClientSession,
        username: Option<&str>,
        password: Option<&[u8]>,
    ) -> Result<bool, AuthError> {
        CredentialStore::authenticate(self, client, username, password).await
    }

    fn authorize_publish(
        &self,
        client: &ClientSession,
        packet: &PublishPacket,
    ) -> Result<(), AuthError> {
        CredentialStore::authorize_publish(self, client, packet)
    }

    fn authorize_subscribe(
        &self,
        client: &ClientSession,
        subscription: Subscription,
    ) -> Result<Option<Subscription>, AuthError> {
        Ok(CredentialStore::authorize_subscribe(self, client, subscription))
    }
}
