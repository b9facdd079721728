//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services jirabot talks to:
//! - Chat services (e.g., Keybase)
//! - Issue trackers (e.g., Jira)
//! - Datastores (e.g., SurrealDB)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod db;
pub mod tracker;
