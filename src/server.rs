//! Inbound HTTP listener.
//!
//! Serves liveness and status routes for operators; everything else the
//! process does goes through chat.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::{base::types::Void, fatal, runtime::Runtime};

/// Launch the HTTP listener.
///
/// Fire-and-forget: the listener runs for the rest of the process
/// lifetime and reports failures through the failure funnel.
pub fn start(runtime: Runtime) {
    fatal::spawn("http listener", run(runtime));
}

#[instrument(skip_all)]
async fn run(runtime: Runtime) -> Void {
    let address = runtime.config.http_address;

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/statusz", get(statusz))
        .with_state(runtime);

    let listener = TcpListener::bind(address).await?;
    info!("HTTP listener on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn statusz(State(runtime): State<Runtime>) -> Json<Value> {
    let subscriptions = runtime
        .db
        .all_subscriptions()
        .await
        .map(|subs| subs.len())
        .unwrap_or_default();

    Json(json!({
        "bot": runtime.chat.bot_username(),
        "jira": runtime.tracker.tracker_name(),
        "subscriptions": subscriptions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_is_static_ok() {
        assert_eq!(healthz().await, "ok");
    }
}
