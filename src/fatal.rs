//! Last-resort failure handling for the process.
//!
//! Every detached task in the codebase is started through [`spawn`], so an
//! asynchronous failure that no subsystem absorbs funnels into a single
//! place, is emitted as one structured record, and terminates the process
//! with a non-zero status. [`install`] adds a process-wide panic hook for
//! failures outside guarded tasks; it runs at process entry, before any
//! asynchronous work can be scheduled.

use std::future::Future;
use std::panic::{self, PanicHookInfo};

use tokio::task::JoinHandle;
use tracing::error;

use crate::base::types::Void;

/// A structured record describing why the process is terminating.
///
/// Created at the moment of failure and consumed immediately by
/// [`exit`]; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    /// Fixed human-readable failure category.
    pub msg: &'static str,
    /// Stringified failure cause, when one exists.
    pub reason: Option<String>,
    /// Formatted representation of the failing asynchronous operation.
    pub operation: Option<String>,
}

impl FatalEvent {
    /// A fatal event with no underlying cause, e.g. rejected configuration.
    pub fn message(msg: &'static str) -> Self {
        Self {
            msg,
            reason: None,
            operation: None,
        }
    }

    /// A fatal event for an asynchronous `operation` that failed with `reason`.
    pub fn unhandled(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            msg: "unhandled task failure",
            reason: Some(reason.to_string()),
            operation: Some(operation.into()),
        }
    }

    /// A fatal event for a panic that reached the process hook.
    pub fn panic(info: &PanicHookInfo<'_>) -> Self {
        Self {
            msg: "unhandled panic",
            reason: Some(info.to_string()),
            operation: None,
        }
    }

    /// Emit the record at error severity.
    ///
    /// The stdout subscriber layer writes synchronously, so the record has
    /// been flushed by the time this returns.
    fn emit(&self) {
        match (self.reason.as_deref(), self.operation.as_deref()) {
            (Some(reason), Some(operation)) => error!(reason, operation, "{}", self.msg),
            (Some(reason), None) => error!(reason, "{}", self.msg),
            (None, Some(operation)) => error!(operation, "{}", self.msg),
            (None, None) => error!("{}", self.msg),
        }
    }
}

/// Emit `event` and terminate the process with a non-zero status.
///
/// There is no retry and no continuation past this point.
pub fn exit(event: FatalEvent) -> ! {
    event.emit();
    std::process::exit(1)
}

/// Install the process-wide panic hook.
///
/// Must run at process entry: the hook has to exist before any
/// asynchronous work can possibly execute.
pub fn install() {
    panic::set_hook(Box::new(|info| {
        exit(FatalEvent::panic(info));
    }));
}

/// Spawn a detached task whose failure has no other handler.
///
/// The future's `Err` is normalized into a [`FatalEvent`] carrying
/// `operation` and the stringified cause, then the process exits. Panics
/// inside the task reach the hook installed by [`install`].
pub fn spawn<F>(operation: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = Void> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = future.await {
            exit(FatalEvent::unhandled(operation, format!("{err:#}")));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn message_event_has_no_cause() {
        let event = FatalEvent::message("invalid bot-config");

        assert_eq!(event.msg, "invalid bot-config");
        assert_eq!(event.reason, None);
        assert_eq!(event.operation, None);
    }

    #[test]
    fn unhandled_event_carries_reason_and_operation() {
        let event = FatalEvent::unhandled("runtime initialization", anyhow!("connection refused"));

        assert_eq!(event.msg, "unhandled task failure");
        assert_eq!(event.reason.as_deref(), Some("connection refused"));
        assert_eq!(event.operation.as_deref(), Some("runtime initialization"));
    }

    #[tokio::test]
    async fn guarded_spawn_runs_the_future() {
        let (tx, rx) = tokio::sync::oneshot::channel();

        spawn("test task", async move {
            let _ = tx.send(());
            Ok(())
        });

        rx.await.expect("task should run");
    }
}
