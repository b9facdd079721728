pub mod jira;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, Void};

// Traits.

/// Generic issue-tracker trait that clients must implement.
///
/// This trait defines the core functionality for talking to an issue
/// tracker like Jira. Implementing this trait allows different trackers
/// to be used with jirabot.
#[async_trait]
pub trait GenericTrackerClient: Send + Sync + 'static {
    /// Get a human-readable name for the tracker, e.g. its base URL.
    fn tracker_name(&self) -> &str;

    /// Verify the tracker is reachable with the configured credentials.
    async fn ping(&self) -> Void;

    /// Search for issues matching a JQL query.
    async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<Issue>>;

    /// Create a new issue in a project and return it.
    async fn create_issue(&self, project: &str, summary: &str, description: &str) -> Res<Issue>;

    /// Add a comment to an existing issue.
    async fn add_comment(&self, key: &str, body: &str) -> Void;
}

// Structs.

/// Issue-tracker client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TrackerClient {
    inner: Arc<dyn GenericTrackerClient>,
}

impl Deref for TrackerClient {
    type Target = dyn GenericTrackerClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl TrackerClient {
    pub fn new(inner: Arc<dyn GenericTrackerClient>) -> Self {
        Self { inner }
    }
}

/// A single issue as surfaced to chat users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Issue key, e.g. `OPS-42`.
    pub key: String,
    /// One-line summary.
    pub summary: String,
    /// Workflow status name.
    pub status: String,
    /// Browse URL.
    pub url: String,
}

impl Issue {
    /// One-line rendering used in chat replies and feed announcements.
    pub fn render(&self) -> String {
        format!("*{}* ({}): {} {}", self.key, self.status, self.summary, self.url)
    }
}
