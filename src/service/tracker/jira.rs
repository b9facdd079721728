//! Jira implementation of the tracker service, over the REST v2 API with
//! basic auth (account email plus API token).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{GenericTrackerClient, Issue, TrackerClient};

// Extra methods on `TrackerClient` applied by the Jira implementation.

impl TrackerClient {
    /// Creates a new Jira tracker client.
    pub fn jira(config: &Config) -> Res<Self> {
        Ok(Self {
            inner: Arc::new(JiraClient::new(config)?),
        })
    }
}

// Structs.

/// Jira client implementation.
pub struct JiraClient {
    base_url: String,
    email: String,
    api_token: String,
    client: Client,
}

impl JiraClient {
    /// Create a new Jira client.
    pub fn new(config: &Config) -> Res<Self> {
        let client = Client::builder().user_agent("jirabot").build()?;

        Ok(Self {
            base_url: config.jira.base_url.trim_end_matches('/').to_string(),
            email: config.jira.email.clone(),
            api_token: config.jira.api_token.clone(),
            client,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, path)
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }
}

#[async_trait]
impl GenericTrackerClient for JiraClient {
    fn tracker_name(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    async fn ping(&self) -> Void {
        let response = self
            .client
            .get(self.api("serverInfo"))
            .basic_auth(&self.email, Some(&self.api_token))
            .send()
            .await?
            .error_for_status()?;

        let info: ServerInfo = response.json().await?;
        info!("Jira reachable: version {}", info.version);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<Issue>> {
        let response = self
            .client
            .get(self.api("search"))
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&[("jql", jql), ("maxResults", &max_results.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let search: SearchResponse = response.json().await?;

        Ok(search
            .issues
            .into_iter()
            .map(|issue| Issue {
                url: self.issue_url(&issue.key),
                key: issue.key,
                summary: issue.fields.summary,
                status: issue.fields.status.name,
            })
            .collect())
    }

    #[instrument(skip(self, description))]
    async fn create_issue(&self, project: &str, summary: &str, description: &str) -> Res<Issue> {
        let body = json!({
            "fields": {
                "project": { "key": project },
                "summary": summary,
                "description": description,
                "issuetype": { "name": "Task" },
            }
        });

        let response = self
            .client
            .post(self.api("issue"))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let created: CreateResponse = response.json().await?;

        Ok(Issue {
            url: self.issue_url(&created.key),
            key: created.key,
            summary: summary.to_string(),
            status: "Open".to_string(),
        })
    }

    #[instrument(skip(self, body))]
    async fn add_comment(&self, key: &str, body: &str) -> Void {
        self.client
            .post(self.api(&format!("issue/{key}/comment")))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct ServerInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    issues: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    key: String,
    fields: WireFields,
}

#[derive(Debug, Deserialize)]
struct WireFields {
    summary: String,
    status: WireStatus,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    key: String,
}
