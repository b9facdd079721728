//! Periodic background tasks.
//!
//! Two independent loops: a feed poller that announces newly-updated Jira
//! issues to subscribed conversations, and a slow sweep that prunes
//! subscriptions the bot can no longer deliver to.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::{base::types::Void, fatal, runtime::Runtime, service::db::FeedSubscription};

/// How far a subscription's cursor may lag before the sweep decides the
/// conversation is gone.
const STALE_SUBSCRIPTION_AGE_DAYS: i64 = 7;

/// Interval between sweep passes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Launch the background task loops.
///
/// Fire-and-forget: both loops run for the rest of the process lifetime
/// and report failures through the failure funnel.
pub fn start(runtime: Runtime) {
    fatal::spawn("feed poller", poll_feeds(runtime.clone()));
    fatal::spawn("subscription sweep", sweep_subscriptions(runtime));
}

#[instrument(skip_all)]
async fn poll_feeds(runtime: Runtime) -> Void {
    let mut ticker = tokio::time::interval(runtime.config.feed_poll_interval);

    loop {
        ticker.tick().await;

        // A failed load is retried at the next tick.
        if let Err(err) = poll_feeds_once(&runtime).await {
            warn!("Failed to load subscriptions: {}", err);
        }
    }
}

/// Run one poll pass over every subscription.
pub async fn poll_feeds_once(runtime: &Runtime) -> Void {
    let subscriptions = runtime.db.all_subscriptions().await?;

    debug!("Polling {} feed subscription(s)", subscriptions.len());

    join_all(
        subscriptions
            .into_iter()
            .map(|subscription| poll_one(runtime, subscription)),
    )
    .await;

    Ok(())
}

/// Poll a single subscription and announce anything new.
async fn poll_one(runtime: &Runtime, subscription: FeedSubscription) {
    if let Err(err) = poll_one_internal(runtime, &subscription).await {
        warn!("Feed poll failed for {}: {}", subscription.id, err);
    }
}

/// The cursor only advances after a fully successful pass, so a
/// conversation the bot cannot deliver to stalls and is eventually swept.
async fn poll_one_internal(runtime: &Runtime, subscription: &FeedSubscription) -> Void {
    let started = Utc::now();
    let jql = updated_since(&subscription.jql, subscription.last_polled);

    let issues = runtime.tracker.search_issues(&jql, 10).await?;

    for issue in &issues {
        runtime
            .chat
            .send_message(&subscription.conv_id, &format!("Feed update: {}", issue.render()))
            .await?;
    }

    runtime.db.advance_cursor(&subscription.id, started).await?;

    Ok(())
}

/// Wrap a subscription's JQL with an update cursor.
fn updated_since(jql: &str, since: DateTime<Utc>) -> String {
    format!(
        "({}) AND updated >= \"{}\" ORDER BY updated ASC",
        jql,
        since.format("%Y-%m-%d %H:%M")
    )
}

#[instrument(skip_all)]
async fn sweep_subscriptions(runtime: Runtime) -> Void {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        ticker.tick().await;

        let stale = Utc::now() - chrono::Duration::days(STALE_SUBSCRIPTION_AGE_DAYS);
        let removed = runtime.db.prune_stale(stale).await?;

        if removed > 0 {
            info!("Swept {} stale subscription(s)", removed);
        } else {
            debug!("Sweep pass complete; nothing stale");
        }
    }
}
