//! Runtime services and shared state for jirabot.

use tracing::instrument;

use crate::base::{config::Config, types::Res};
use crate::service::{chat::ChatClient, db::DbClient, tracker::TrackerClient};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the datastore client, tracker client, chat client, and
/// configuration. It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The datastore client instance.
    pub db: DbClient,
    /// The tracker client instance.
    pub tracker: TrackerClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Construct the shared context.
    ///
    /// Runs once per process lifetime; every subsystem receives a clone
    /// sharing the same underlying services.
    #[instrument(skip_all)]
    pub async fn init(config: Config) -> Res<Self> {
        // Connect the datastore.
        let db = DbClient::connect(&config).await?;

        // Initialize the tracker client and verify reachability.
        let tracker = TrackerClient::jira(&config)?;
        tracker.ping().await?;

        // Initialize the chat client.
        let chat = ChatClient::keybase(&config).await?;

        Ok(Self { config, db, tracker, chat })
    }
}
