//! topicguard core
//!
//! This crate provides the JSON file credential store that answers a
//! publish/subscribe broker's authenticate, authorize-publish and
//! authorize-subscribe hooks, along with the topic pattern matcher and the
//! callback adapters the broker plugs in.

pub mod authorizer;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod glob;
pub mod hooks;
pub mod session;
pub mod store;

pub use authorizer::Authorizer;
pub use config::StoreConfig;
pub use credentials::{CredentialFile, CredentialRecord};
pub use error::StoreError;
pub use events::{AuthEvent, EventSink, TracingSink};
pub use glob::{MATCH_ALL, PatternError, TopicPattern};
pub use hooks::{
    AuthenticateDone, PublishDone, SubscribeDone, authenticate_hook, authorize_publish_hook,
    authorize_subscribe_hook,
};
pub use session::{ClientSession, PublishPacket, QoS, Subscription};
pub use store::{CredentialStore, InitOutcome};
