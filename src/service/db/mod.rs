pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::base::types::{Res, Void};

// Traits.

/// Generic datastore trait that clients must implement.
///
/// This trait defines the core functionality for storing per-channel
/// settings and Jira feed subscriptions. Implementing this trait allows
/// different datastore backends to be used with jirabot.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Gets the settings for a conversation; creates defaults if absent.
    async fn get_or_create_channel(&self, conv_id: &str) -> Res<ChannelSettings>;

    /// Sets the default project for a conversation.
    async fn set_default_project(&self, conv_id: &str, project: &str) -> Void;

    /// Adds a feed subscription for a conversation and returns it.
    async fn add_subscription(&self, conv_id: &str, jql: &str) -> Res<FeedSubscription>;

    /// Removes one of a conversation's subscriptions. Returns whether it existed.
    async fn remove_subscription(&self, conv_id: &str, id: &str) -> Res<bool>;

    /// Lists the subscriptions for one conversation.
    async fn list_subscriptions(&self, conv_id: &str) -> Res<Vec<FeedSubscription>>;

    /// Lists every subscription across all conversations.
    async fn all_subscriptions(&self) -> Res<Vec<FeedSubscription>>;

    /// Advances a subscription's poll cursor.
    async fn advance_cursor(&self, id: &str, to: DateTime<Utc>) -> Void;

    /// Drops subscriptions whose cursor predates `stale`; returns how many.
    ///
    /// The poller only advances a cursor after a fully successful pass, so
    /// a long-stalled cursor marks a conversation the bot can no longer
    /// deliver to.
    async fn prune_stale(&self, stale: DateTime<Utc>) -> Res<u64>;
}

// Structs.

/// Datastore client for jirabot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The datastore client instance.
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}

/// Per-conversation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Conversation this record belongs to.
    pub conv_id: String,
    /// Project used when a command does not name one.
    pub default_project: Option<String>,
}

/// A saved Jira feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSubscription {
    /// Stable identifier, used for unsubscribe.
    pub id: String,
    /// Conversation the feed announces into.
    pub conv_id: String,
    /// JQL the feed polls.
    pub jql: String,
    /// Upper bound of the last completed poll.
    pub last_polled: DateTime<Utc>,
}
