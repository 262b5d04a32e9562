//! Administrative commands over the credential store

use anyhow::{Context, Result};
use clap::Subcommand;
use topicguard_core::{ClientSession, CredentialStore, InitOutcome, StoreConfig};
use tracing::debug;

/// Client identifier used when checking credentials from the command line
const CLI_CLIENT_ID: &str = "topicguard-cli";

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a user, or replace an existing one
    #[command(name = "adduser")]
    AddUser {
        username: String,
        password: String,
        /// Glob pattern of topics the user may publish to
        #[arg(long)]
        authorize_publish: Option<String>,
        /// Glob pattern of topic filters the user may subscribe to
        #[arg(long)]
        authorize_subscribe: Option<String>,
    },

    /// Remove a user
    #[command(name = "rmuser")]
    RmUser { username: String },

    /// List configured users and their topic patterns
    List,

    /// Check a username and password against the credentials file
    Verify { username: String, password: String },

    /// Print the authorizer's configurable options
    Options,
}

/// Run a command and return the text to print
pub async fn run(command: Command, store: &CredentialStore) -> Result<String> {
    match command {
        Command::AddUser {
            username,
            password,
            authorize_publish,
            authorize_subscribe,
        } => {
            if store.init(true).await? == InitOutcome::Created {
                debug!("Starting a new credentials file");
            }

            let previous = store
                .add_user(
                    &username,
                    &password,
                    authorize_publish.as_deref(),
                    authorize_subscribe.as_deref(),
                )
                .await
                .with_context(|| format!("Failed to add user {}", username))?;
            store.save().await.context("Failed to save credentials")?;

            let verb = if previous.is_some() { "updated" } else { "added" };
            Ok(format!("user {} {}", username, verb))
        }
        Command::RmUser { username } => {
            load(store).await?;

            if store.remove_user(&username)?.is_none() {
                return Ok(format!("user {} not found", username));
            }
            store.save().await.context("Failed to save credentials")?;

            Ok(format!("user {} removed", username))
        }
        Command::List => {
            load(store).await?;

            let lines: Vec<String> = store
                .list_users()
                .into_iter()
                .filter_map(|name| {
                    store.get_user(&name).map(|record| {
                        format!(
                            "{}\tpublish={}\tsubscribe={}",
                            name, record.authorize_publish, record.authorize_subscribe
                        )
                    })
                })
                .collect();

            if lines.is_empty() {
                Ok("no users configured".to_string())
            } else {
                Ok(lines.join("\n"))
            }
        }
        Command::Verify { username, password } => {
            load(store).await?;

            let client = ClientSession::new(CLI_CLIENT_ID);
            let accepted = store
                .authenticate(&client, Some(&username), Some(password.as_bytes()))
                .await
                .context("Credential verification failed")?;

            Ok(if accepted {
                format!("credentials for {} accepted", username)
            } else {
                format!("credentials for {} rejected", username)
            })
        }
        Command::Options => Ok(StoreConfig::describe_options().to_string()),
    }
}

async fn load(store: &CredentialStore) -> Result<()> {
    store
        .init(false)
        .await
        .with_context(|| format!("Unable to load {:?}", store.config().credentials))?;
    Ok(())
}
