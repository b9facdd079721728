#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jirabot::{
    base::{
        config::{Config, ConfigInner, JiraConfig, KeybaseConfig},
        types::{Res, Void},
    },
    interaction::chat_event::handle_chat_event,
    runtime::Runtime,
    service::{
        chat::{ChatClient, ChatMessage, GenericChatClient, MessageHandler},
        db::{ChannelSettings, DbClient, FeedSubscription, GenericDbClient},
        tracker::{GenericTrackerClient, Issue, TrackerClient},
    },
};
use mockall::mock;
use tokio::time::timeout;

// Mocks.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        fn bot_username(&self) -> &str;
        async fn listen(&self, handler: MessageHandler) -> Void;
        async fn send_message(&self, conv_id: &str, text: &str) -> Void;
    }
}

mock! {
    pub Tracker {}

    #[async_trait]
    impl GenericTrackerClient for Tracker {
        fn tracker_name(&self) -> &str;
        async fn ping(&self) -> Void;
        async fn search_issues(&self, jql: &str, max_results: u32) -> Res<Vec<Issue>>;
        async fn create_issue(&self, project: &str, summary: &str, description: &str) -> Res<Issue>;
        async fn add_comment(&self, key: &str, body: &str) -> Void;
    }
}

mock! {
    pub Db {}

    #[async_trait]
    impl GenericDbClient for Db {
        async fn get_or_create_channel(&self, conv_id: &str) -> Res<ChannelSettings>;
        async fn set_default_project(&self, conv_id: &str, project: &str) -> Void;
        async fn add_subscription(&self, conv_id: &str, jql: &str) -> Res<FeedSubscription>;
        async fn remove_subscription(&self, conv_id: &str, id: &str) -> Res<bool>;
        async fn list_subscriptions(&self, conv_id: &str) -> Res<Vec<FeedSubscription>>;
        async fn all_subscriptions(&self) -> Res<Vec<FeedSubscription>>;
        async fn advance_cursor(&self, id: &str, to: DateTime<Utc>) -> Void;
        async fn prune_stale(&self, stale: DateTime<Utc>) -> Res<u64>;
    }
}

// Helpers.

fn test_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            keybase: KeybaseConfig {
                username: "jirabot".to_string(),
                paperkey: "pk".to_string(),
                ..Default::default()
            },
            jira: JiraConfig {
                base_url: "https://example.atlassian.net".to_string(),
                email: "bot@example.com".to_string(),
                api_token: "t0ken".to_string(),
                default_project: None,
            },
            ..Default::default()
        }),
    }
}

fn message(body: &str) -> ChatMessage {
    ChatMessage {
        conv_id: "conv1".to_string(),
        channel: "acme.ops".to_string(),
        sender: "alice".to_string(),
        body: body.to_string(),
    }
}

/// Capture every reply the handler sends, so tests can await the
/// fire-and-forget task's outcome.
fn capture_replies(mock: &mut MockChat) -> tokio::sync::mpsc::UnboundedReceiver<String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    mock.expect_send_message().returning(move |_, text| {
        let _ = tx.send(text.to_string());
        Ok(())
    });

    rx
}

async fn next_reply(replies: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(5), replies.recv())
        .await
        .expect("handler should reply in time")
        .expect("reply channel should stay open")
}

// Tests.

#[test]
fn runtime_clones_share_the_same_services() {
    let runtime = Runtime {
        config: test_config(),
        db: DbClient::new(Arc::new(MockDb::new())),
        tracker: TrackerClient::new(Arc::new(MockTracker::new())),
        chat: ChatClient::new(Arc::new(MockChat::new())),
    };

    // One clone per subsystem, the way the supervisor fans out.
    let for_server = runtime.clone();
    let for_tasks = runtime.clone();
    let for_bot = runtime;

    assert!(Arc::ptr_eq(&for_server.db.inner, &for_tasks.db.inner));
    assert!(Arc::ptr_eq(&for_tasks.db.inner, &for_bot.db.inner));
    assert!(Arc::ptr_eq(&for_server.config.inner, &for_bot.config.inner));
}

#[test]
fn captured_config_source_ignores_later_env_mutation() {
    unsafe { std::env::set_var("JIRABOT_CONFIG_CAPTURE_TEST", "{}") };
    let raw = std::env::var("JIRABOT_CONFIG_CAPTURE_TEST").unwrap_or_default();

    unsafe { std::env::set_var("JIRABOT_CONFIG_CAPTURE_TEST", r#"{"changed":true}"#) };

    assert_eq!(raw, "{}");
}

#[tokio::test]
async fn search_replies_with_rendered_issues() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let mut tracker = MockTracker::new();
    tracker
        .expect_search_issues()
        .withf(|jql, _| jql.contains("pager"))
        .returning(|_, _| {
            Ok(vec![Issue {
                key: "OPS-42".to_string(),
                summary: "Pager is on fire".to_string(),
                status: "Open".to_string(),
                url: "https://example.atlassian.net/browse/OPS-42".to_string(),
            }])
        });

    handle_chat_event(
        message("!jira search pager"),
        test_config(),
        DbClient::new(Arc::new(MockDb::new())),
        TrackerClient::new(Arc::new(tracker)),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("OPS-42"));
    assert!(reply.contains("Pager is on fire"));
}

#[tokio::test]
async fn create_falls_back_to_the_channel_default_project() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let mut db = MockDb::new();
    db.expect_get_or_create_channel().returning(|conv_id| {
        Ok(ChannelSettings {
            conv_id: conv_id.to_string(),
            default_project: Some("OPS".to_string()),
        })
    });

    let mut tracker = MockTracker::new();
    tracker
        .expect_create_issue()
        .withf(|project, summary, description| {
            project == "OPS" && summary == "pager is on fire" && description.is_empty()
        })
        .returning(|project, summary, _| {
            Ok(Issue {
                key: format!("{project}-1"),
                summary: summary.to_string(),
                status: "Open".to_string(),
                url: "https://example.atlassian.net/browse/OPS-1".to_string(),
            })
        });

    handle_chat_event(
        message("!jira create pager is on fire"),
        test_config(),
        DbClient::new(Arc::new(db)),
        TrackerClient::new(Arc::new(tracker)),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("Created"));
    assert!(reply.contains("OPS-1"));
}

#[tokio::test]
async fn create_without_any_project_asks_for_one() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let mut db = MockDb::new();
    db.expect_get_or_create_channel().returning(|conv_id| {
        Ok(ChannelSettings {
            conv_id: conv_id.to_string(),
            default_project: None,
        })
    });

    // No tracker expectations: the handler must not reach Jira.
    handle_chat_event(
        message("!jira create pager is on fire"),
        test_config(),
        DbClient::new(Arc::new(db)),
        TrackerClient::new(Arc::new(MockTracker::new())),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("No project set"));
}

#[tokio::test]
async fn malformed_commands_reply_with_usage() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    handle_chat_event(
        message("!jira dance"),
        test_config(),
        DbClient::new(Arc::new(MockDb::new())),
        TrackerClient::new(Arc::new(MockTracker::new())),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("!jira search <query>"));
}

#[tokio::test]
async fn subscribe_stores_the_feed_and_replies_with_its_id() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let mut db = MockDb::new();
    db.expect_add_subscription()
        .withf(|conv_id, jql| conv_id == "conv1" && jql == "project = OPS")
        .returning(|conv_id, jql| {
            Ok(FeedSubscription {
                id: "18f3a2".to_string(),
                conv_id: conv_id.to_string(),
                jql: jql.to_string(),
                last_polled: Utc::now(),
            })
        });

    handle_chat_event(
        message("!jira subscribe project = OPS"),
        test_config(),
        DbClient::new(Arc::new(db)),
        TrackerClient::new(Arc::new(MockTracker::new())),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("Subscribed (18f3a2)"));
    assert!(reply.contains("project = OPS"));
}

#[tokio::test]
async fn feed_poll_announces_new_issues_and_advances_the_cursor() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let last_polled = Utc::now() - chrono::Duration::hours(1);

    let mut db = MockDb::new();
    let stored = vec![FeedSubscription {
        id: "18f3a2".to_string(),
        conv_id: "conv1".to_string(),
        jql: "project = OPS".to_string(),
        last_polled,
    }];
    db.expect_all_subscriptions().return_once(move || Ok(stored));

    let (cursor_tx, mut cursor_rx) = tokio::sync::mpsc::unbounded_channel();
    db.expect_advance_cursor()
        .withf(|id, _| id == "18f3a2")
        .returning(move |_, to| {
            let _ = cursor_tx.send(to);
            Ok(())
        });

    let mut tracker = MockTracker::new();
    tracker
        .expect_search_issues()
        .withf(|jql, _| jql.starts_with("(project = OPS) AND updated >= "))
        .returning(|_, _| {
            Ok(vec![Issue {
                key: "OPS-7".to_string(),
                summary: "Disk filling up".to_string(),
                status: "Open".to_string(),
                url: "https://example.atlassian.net/browse/OPS-7".to_string(),
            }])
        });

    let runtime = Runtime {
        config: test_config(),
        db: DbClient::new(Arc::new(db)),
        tracker: TrackerClient::new(Arc::new(tracker)),
        chat: ChatClient::new(Arc::new(chat)),
    };

    jirabot::tasks::poll_feeds_once(&runtime).await.expect("poll should succeed");

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("Feed update"));
    assert!(reply.contains("OPS-7"));

    let advanced = cursor_rx.try_recv().expect("cursor should advance");
    assert!(advanced > last_polled);
}

#[tokio::test]
async fn tracker_failures_are_reported_to_the_channel() {
    let mut chat = MockChat::new();
    let mut replies = capture_replies(&mut chat);

    let mut tracker = MockTracker::new();
    tracker
        .expect_add_comment()
        .returning(|_, _| Err(anyhow::anyhow!("boom")));

    handle_chat_event(
        message("!jira comment OPS-42 fixed by restart"),
        test_config(),
        DbClient::new(Arc::new(MockDb::new())),
        TrackerClient::new(Arc::new(tracker)),
        ChatClient::new(Arc::new(chat)),
    );

    let reply = next_reply(&mut replies).await;
    assert!(reply.contains("Something went wrong"));
}
