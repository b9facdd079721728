//! Command handling for inbound chat messages.
//!
//! This module provides functionality for turning chat messages into work:
//! - Parsing `!jira` commands out of message bodies
//! - Driving the tracker, datastore, and chat services per command

pub mod chat_event;
pub mod command;
