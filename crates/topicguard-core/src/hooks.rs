//! Callback adapters for the broker's hook protocol
//!
//! The broker calls a hook once per client action and waits for exactly one
//! completion through `done`. Each `done` is a boxed `FnOnce`, so it can run
//! at most once; every path through these adapters runs it. Authentication
//! runs on the Tokio runtime and still completes if its task panics or no
//! runtime is available. Publish and subscribe checks complete inline.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use topicguard_auth::AuthError;
use tracing::error;

use crate::authorizer::Authorizer;
use crate::session::{ClientSession, PublishPacket, Subscription};

/// Completion for `authenticate`: `Ok(true)` accepts the login
pub type AuthenticateDone = Box<dyn FnOnce(Result<bool, AuthError>) + Send + 'static>;

/// Completion for `authorize_publish`: `Err` rejects the publish
pub type PublishDone = Box<dyn FnOnce(Result<(), AuthError>) + Send + 'static>;

/// Completion for `authorize_subscribe`: `Ok(None)` drops the subscription
pub type SubscribeDone =
    Box<dyn FnOnce(Result<Option<Subscription>, AuthError>) + Send + 'static>;

/// Run a decision on the current runtime and hand its result to `done`
fn spawn_decision<T, F>(done: Box<dyn FnOnce(Result<T, AuthError>) + Send + 'static>, decision: F)
where
    T: Send + 'static,
    F: Future<Output = Result<T, AuthError>> + Send + 'static,
{
    let handle = match Handle::try_current() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Authorization hook invoked outside a Tokio runtime");
            done(Err(AuthError::TaskFailed(e.to_string())));
            return;
        }
    };

    let task = handle.spawn(decision);
    handle.spawn(async move {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Authorization task failed: {}", e);
                Err(AuthError::TaskFailed(e.to_string()))
            }
        };
        done(result);
    });
}

/// Build the authenticate hook
pub fn authenticate_hook(
    authorizer: Arc<dyn Authorizer>,
) -> impl Fn(Arc<ClientSession>, Option<String>, Option<Vec<u8>>, AuthenticateDone) + Send + Sync + 'static
{
    move |client: Arc<ClientSession>,
          username: Option<String>,
          password: Option<Vec<u8>>,
          done: AuthenticateDone| {
        let authorizer = authorizer.clone();
        spawn_decision(done, async move {
            authorizer
                .authenticate(&client, username.as_deref(), password.as_deref())
                .await
        });
    }
}

/// Build the publish authorization hook
///
/// The decision completes inline on the calling thread.
pub fn authorize_publish_hook(
    authorizer: Arc<dyn Authorizer>,
) -> impl Fn(Arc<ClientSession>, PublishPacket, PublishDone) + Send + Sync + 'static {
    move |client: Arc<ClientSession>, packet: PublishPacket, done: PublishDone| {
        done(authorizer.authorize_publish(&client, &packet));
    }
}

/// Build the subscribe authorization hook
///
/// The decision completes inline on the calling thread.
pub fn authorize_subscribe_hook(
    authorizer: Arc<dyn Authorizer>,
) -> impl Fn(Arc<ClientSession>, Subscription, SubscribeDone) + Send + Sync + 'static {
    move |client: Arc<ClientSession>, subscription: Subscription, done: SubscribeDone| {
        done(authorizer.authorize_subscribe(&client, subscription));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::session::QoS;
    use crate::store::CredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;
    use topicguard_auth::PasswordHasher;

    async fn store_with_bob(dir: &tempfile::TempDir) -> Arc<dyn Authorizer> {
        let store = CredentialStore::new(StoreConfig::new(dir.path().join("credentials.json")))
            .with_hasher(PasswordHasher::with_cost(8, 1, 1).unwrap());
        store.init(true).await.unwrap();
        store
            .add_user("bob", "pw", Some("sensors/*"), Some("sensors/*"))
            .await
            .unwrap();
        Arc::new(store)
    }

    /// Box a `done` that forwards its result to a oneshot channel
    fn channel_done<T: Send + 'static>() -> (
        Box<dyn FnOnce(Result<T, AuthError>) + Send + 'static>,
        oneshot::Receiver<Result<T, AuthError>>,
    ) {
        let (tx, rx) = oneshot::channel::<Result<T, AuthError>>();
        let done: Box<dyn FnOnce(Result<T, AuthError>) + Send + 'static> =
            Box::new(move |result| {
                let _ = tx.send(result);
            });
        (done, rx)
    }

    async fn authenticated_client(
        authorizer: &Arc<dyn Authorizer>,
        id: &str,
    ) -> Arc<ClientSession> {
        let hook = authenticate_hook(authorizer.clone());
        let client = Arc::new(ClientSession::new(id));
        let (done, rx) = channel_done();
        hook(
            client.clone(),
            Some("bob".to_string()),
            Some(b"pw".to_vec()),
            done,
        );
        assert_eq!(rx.await.unwrap(), Ok(true));
        client
    }

    #[tokio::test]
    async fn test_authenticate_hook() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = store_with_bob(&dir).await;
        let hook = authenticate_hook(authorizer.clone());

        let client = authenticated_client(&authorizer, "c1").await;
        assert_eq!(client.username().as_deref(), Some("bob"));

        let (done, rx) = channel_done();
        hook(
            Arc::new(ClientSession::new("c2")),
            Some("bob".to_string()),
            Some(b"wrong".to_vec()),
            done,
        );
        assert_eq!(rx.await.unwrap(), Ok(false));

        let (done, rx) = channel_done();
        hook(Arc::new(ClientSession::new("c3")), None, None, done);
        assert_eq!(rx.await.unwrap(), Ok(false));
    }

    #[tokio::test]
    async fn test_publish_hook() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = store_with_bob(&dir).await;
        let client = authenticated_client(&authorizer, "c1").await;
        let hook = authorize_publish_hook(authorizer);

        let (done, rx) = channel_done();
        hook(client.clone(), PublishPacket::new("sensors/temp", "21"), done);
        assert_eq!(rx.await.unwrap(), Ok(()));

        let (done, rx) = channel_done();
        hook(client, PublishPacket::new("admin/cmd", "reboot"), done);
        assert_eq!(
            rx.await.unwrap(),
            Err(AuthError::PublishNotAuthorized {
                topic: "admin/cmd".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_subscribe_hook() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = store_with_bob(&dir).await;
        let client = authenticated_client(&authorizer, "c1").await;
        let hook = authorize_subscribe_hook(authorizer);

        let request = Subscription::new("sensors/temp", QoS::ExactlyOnce);
        let (done, rx) = channel_done();
        hook(client.clone(), request.clone(), done);
        assert_eq!(rx.await.unwrap(), Ok(Some(request)));

        let (done, rx) = channel_done();
        hook(client, Subscription::new("admin/#", QoS::AtMostOnce), done);
        assert_eq!(rx.await.unwrap(), Ok(None));
    }

    struct PanickingAuthorizer;

    #[async_trait]
    impl Authorizer for PanickingAuthorizer {
        async fn authenticate(
            &self,
            _client: &ClientSession,
            _username: Option<&str>,
            _password: Option<&[u8]>,
        ) -> Result<bool, AuthError> {
            panic!("verification backend crashed");
        }

        fn authorize_publish(
            &self,
            _client: &ClientSession,
            _packet: &PublishPacket,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        fn authorize_subscribe(
            &self,
            _client: &ClientSession,
            subscription: Subscription,
        ) -> Result<Option<Subscription>, AuthError> {
            Ok(Some(subscription))
        }
    }

    #[tokio::test]
    async fn test_panicking_decision_still_completes_once() {
        let hook = authenticate_hook(Arc::new(PanickingAuthorizer));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = calls.clone();
        hook(
            Arc::new(ClientSession::new("c1")),
            Some("bob".to_string()),
            Some(b"pw".to_vec()),
            Box::new(move |result: Result<bool, AuthError>| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(result);
            }),
        );

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(AuthError::TaskFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_authenticate_without_runtime_completes_with_error() {
        let hook = authenticate_hook(Arc::new(PanickingAuthorizer));
        let result = Arc::new(parking_lot::Mutex::new(None));

        let slot = result.clone();
        hook(
            Arc::new(ClientSession::new("c1")),
            Some("bob".to_string()),
            Some(b"pw".to_vec()),
            Box::new(move |r: Result<bool, AuthError>| {
                *slot.lock() = Some(r);
            }),
        );

        assert!(matches!(
            result.lock().take(),
            Some(Err(AuthError::TaskFailed(_)))
        ));
    }

    #[test]
    fn test_topic_hooks_complete_inline_without_runtime() {
        let authorizer: Arc<dyn Authorizer> = Arc::new(CredentialStore::new(StoreConfig::new(
            "/nonexistent/credentials.json",
        )));
        let client = Arc::new(ClientSession::new("c1"));

        let published = Arc::new(parking_lot::Mutex::new(None));
        let slot = published.clone();
        authorize_publish_hook(authorizer.clone())(
            client.clone(),
            PublishPacket::new("a", "x"),
            Box::new(move |r: Result<(), AuthError>| {
                *slot.lock() = Some(r);
            }),
        );
        assert_eq!(
            published.lock().take(),
            Some(Err(AuthError::PublishNotAuthorized {
                topic: "a".to_string()
            }))
        );

        let subscribed = Arc::new(parking_lot::Mutex::new(None));
        let slot = subscribed.clone();
        authorize_subscribe_hook(authorizer)(
            client,
            Subscription::new("a", QoS::AtMostOnce),
            Box::new(move |r: Result<Option<Subscription>, AuthError>| {
                *slot.lock() = Some(r);
            }),
        );
        assert_eq!(subscribed.lock().take(), Some(Ok(None)));
    }

    #[test]
    fn test_topic_hooks_pass_decision_through() {
        let hook = authorize_subscribe_hook(Arc::new(PanickingAuthorizer));
        let request = Subscription::new("sensors/temp", QoS::AtLeastOnce);
        let granted = Arc::new(parking_lot::Mutex::new(None));

        let slot = granted.clone();
        hook(
            Arc::new(ClientSession::new("c1")),
            request.clone(),
            Box::new(move |r: Result<Option<Subscription>, AuthError>| {
                *slot.lock() = Some(r);
            }),
        );
        assert_eq!(granted.lock().take(), Some(Ok(Some(request))));
    }

    #[tokio::test]
    async fn test_ignored_result_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let authorizer = store_with_bob(&dir).await;
        let hook = authenticate_hook(authorizer);

        let (done, rx) = channel_done::<bool>();
        drop(rx);
        hook(
            Arc::new(ClientSession::new("c1")),
            Some("bob".to_string()),
            Some(b"pw".to_vec()),
            done,
        );
        tokio::task::yield_now().await;
    }
}
