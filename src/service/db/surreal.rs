//! SurrealDB implementation of the datastore service.
//!
//! Channel settings are keyed by conversation id; subscriptions carry
//! their own key so unsubscribe can name them from chat. Poll cursors are
//! stored as unix milliseconds, which keeps the staleness comparison in
//! [`prune_stale`](super::GenericDbClient::prune_stale) numeric.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::instrument;

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{ChannelSettings, DbClient, FeedSubscription, GenericDbClient};

const NAMESPACE: &str = "jirabot";
const DATABASE: &str = "jirabot";

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Creates a new client against the configured endpoint.
    #[instrument(skip_all)]
    pub async fn connect(config: &Config) -> Res<Self> {
        let db = any::connect(&config.db.endpoint).await?;

        if let (Some(username), Some(password)) = (config.db.username.as_deref(), config.db.password.as_deref()) {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        Ok(Self {
            inner: Arc::new(SurrealDbClient { db }),
        })
    }

    /// Creates an in-memory client, used by tests.
    pub async fn memory() -> Res<Self> {
        let db = any::connect("mem://").await?;
        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        Ok(Self {
            inner: Arc::new(SurrealDbClient { db }),
        })
    }
}

// Structs.

/// SurrealDB client implementation.
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

// Record types.

#[derive(Debug, Serialize, Deserialize)]
struct ChannelRecord {
    conv_id: String,
    default_project: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionRecord {
    sub_id: String,
    conv_id: String,
    jql: String,
    last_polled_ms: i64,
}

impl From<ChannelRecord> for ChannelSettings {
    fn from(record: ChannelRecord) -> Self {
        Self {
            conv_id: record.conv_id,
            default_project: record.default_project,
        }
    }
}

impl From<SubscriptionRecord> for FeedSubscription {
    fn from(record: SubscriptionRecord) -> Self {
        let last_polled = Utc
            .timestamp_millis_opt(record.last_polled_ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            id: record.sub_id,
            conv_id: record.conv_id,
            jql: record.jql,
            last_polled,
        }
    }
}

/// Subscription keys only need to be unique within one datastore, and the
/// datastore is written from a single process.
fn fresh_sub_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos:x}")
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    async fn get_or_create_channel(&self, conv_id: &str) -> Res<ChannelSettings> {
        let existing: Option<ChannelRecord> = self.db.select(("channel", conv_id)).await?;
        if let Some(record) = existing {
            return Ok(record.into());
        }

        let record = ChannelRecord {
            conv_id: conv_id.to_string(),
            default_project: None,
        };

        let created: Option<ChannelRecord> = self.db.create(("channel", conv_id)).content(record).await?;
        created
            .map(Into::into)
            .ok_or_else(|| anyhow::anyhow!("Failed to create channel record"))
    }

    async fn set_default_project(&self, conv_id: &str, project: &str) -> Void {
        self.get_or_create_channel(conv_id).await?;

        let _: Option<ChannelRecord> = self
            .db
            .update(("channel", conv_id))
            .merge(serde_json::json!({ "default_project": project }))
            .await?;

        Ok(())
    }

    async fn add_subscription(&self, conv_id: &str, jql: &str) -> Res<FeedSubscription> {
        let record = SubscriptionRecord {
            sub_id: fresh_sub_id(),
            conv_id: conv_id.to_string(),
            jql: jql.to_string(),
            last_polled_ms: Utc::now().timestamp_millis(),
        };

        let key = record.sub_id.clone();
        let created: Option<SubscriptionRecord> = self.db.create(("subscription", key.as_str())).content(record).await?;

        created
            .map(Into::into)
            .ok_or_else(|| anyhow::anyhow!("Failed to create subscription record"))
    }

    async fn remove_subscription(&self, conv_id: &str, id: &str) -> Res<bool> {
        // Only the owning conversation may remove a subscription.
        let existing: Option<SubscriptionRecord> = self.db.select(("subscription", id)).await?;
        match existing {
            Some(record) if record.conv_id == conv_id => {
                let _: Option<SubscriptionRecord> = self.db.delete(("subscription", id)).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_subscriptions(&self, conv_id: &str) -> Res<Vec<FeedSubscription>> {
        let mut response = self
            .db
            .query("SELECT * FROM subscription WHERE conv_id = $conv_id")
            .bind(("conv_id", conv_id.to_string()))
            .await?;

        let records: Vec<SubscriptionRecord> = response.take(0)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn all_subscriptions(&self) -> Res<Vec<FeedSubscription>> {
        let records: Vec<SubscriptionRecord> = self.db.select("subscription").await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn advance_cursor(&self, id: &str, to: DateTime<Utc>) -> Void {
        let _: Option<SubscriptionRecord> = self
            .db
            .update(("subscription", id))
            .merge(serde_json::json!({ "last_polled_ms": to.timestamp_millis() }))
            .await?;

        Ok(())
    }

    async fn prune_stale(&self, stale: DateTime<Utc>) -> Res<u64> {
        let mut response = self
            .db
            .query("DELETE FROM subscription WHERE last_polled_ms < $stale RETURN BEFORE")
            .bind(("stale", stale.timestamp_millis()))
            .await?;

        let removed: Vec<SubscriptionRecord> = response.take(0)?;
        Ok(removed.len() as u64)
    }
}
