//! Library root for `jirabot`.
//!
//! Jirabot is a Keybase chat bridge for Jira:
//! - Search, create, and comment on issues from any channel
//! - Per-channel default projects and JQL feed subscriptions
//! - A health/status HTTP surface for operators
//!
//! The bot integrates with Keybase for chat, Jira for issue tracking, and
//! SurrealDB for storage. The architecture is built around extensible
//! traits that allow for different implementations of each service.
//!
//! Process assembly is deliberately small: validate the
//! environment-supplied configuration, construct the shared
//! [`runtime::Runtime`] once, then launch the HTTP listener, the
//! background tasks, and the bot loop, all under the single fail-fast
//! policy in [`fatal`].

#[deny(missing_docs)]
pub mod base;
pub mod bot;
pub mod fatal;
pub mod interaction;
pub mod runtime;
pub mod server;
pub mod service;
pub mod tasks;

use base::{config::Config, types::Void};
use fatal::FatalEvent;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Drives the startup sequence: validate `raw_config`, construct the
/// shared runtime context, and fan out to the three subsystems. Each step
/// gates the next, and both failure points terminate the process through
/// [`fatal`].
pub async fn start(raw_config: String) -> Void {
    info!("Starting jirabot ...");

    // Absent and invalid configuration are deliberately indistinguishable
    // here.
    let Some(config) = Config::parse(&raw_config) else {
        fatal::exit(FatalEvent::message("invalid bot-config"));
    };

    launch(config);

    // The subsystems own the process from here; park until the operator
    // stops us.
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Construct the shared context, then start every subsystem with a clone
/// of it.
///
/// Context construction has no local error handler: a failure funnels
/// through [`fatal::spawn`] like any other unhandled asynchronous
/// failure, and no subsystem is launched.
fn launch(config: Config) {
    fatal::spawn("runtime initialization", async move {
        let runtime = runtime::Runtime::init(config).await?;

        server::start(runtime.clone());
        tasks::start(runtime.clone());
        bot::start(runtime);

        Ok(())
    });
}
