use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{config::Config, types::Void},
    service::{
        chat::{ChatClient, ChatMessage},
        db::DbClient,
        tracker::{Issue, TrackerClient},
    },
};

use super::command::{self, Command};

/// Handle an inbound command message.
///
/// Spawns a task per message so one slow tracker call cannot stall the
/// listener. Failures here are expected operational noise: they are
/// logged and reported to the channel, not escalated.
#[instrument(skip_all)]
pub fn handle_chat_event(message: ChatMessage, config: Config, db: DbClient, tracker: TrackerClient, chat: ChatClient) {
    tokio::spawn(async move {
        let conv_id = message.conv_id.clone();

        // Process the event.
        let result = handle_chat_event_internal(message, &config, &db, &tracker, &chat)
            .in_current_span()
            .await;

        // Log any errors and tell the channel.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
            let _ = chat
                .send_message(&conv_id, "Something went wrong talking to Jira; check the logs.")
                .await;
        }
    });
}

#[instrument(skip_all)]
async fn handle_chat_event_internal(
    message: ChatMessage,
    config: &Config,
    db: &DbClient,
    tracker: &TrackerClient,
    chat: &ChatClient,
) -> Void {
    let Some(parsed) = command::parse(&message.body) else {
        chat.send_message(&message.conv_id, command::USAGE).await?;
        return Ok(());
    };

    info!("Handling command from {} in {}", message.sender, message.channel);

    match parsed {
        Command::Help => {
            chat.send_message(&message.conv_id, command::USAGE).await?;
        }
        Command::Search { query } => {
            let issues = tracker.search_issues(&search_jql(&query), 5).await?;

            let reply = if issues.is_empty() {
                "No matching issues.".to_string()
            } else {
                issues.iter().map(Issue::render).collect::<Vec<_>>().join("\n")
            };

            chat.send_message(&message.conv_id, &reply).await?;
        }
        Command::Create {
            project,
            summary,
            description,
        } => {
            let project = match project {
                Some(project) => project,
                None => {
                    let channel = db.get_or_create_channel(&message.conv_id).await?;
                    match channel.default_project.or_else(|| config.jira.default_project.clone()) {
                        Some(project) => project,
                        None => {
                            chat.send_message(
                                &message.conv_id,
                                "No project set for this channel; name one, or set one with `!jira project <PROJECT>`.",
                            )
                            .await?;
                            return Ok(());
                        }
                    }
                }
            };

            let issue = tracker.create_issue(&project, &summary, &description).await?;
            chat.send_message(&message.conv_id, &format!("Created {}", issue.render())).await?;
        }
        Command::Comment { key, body } => {
            tracker.add_comment(&key, &body).await?;
            chat.send_message(&message.conv_id, &format!("Commented on {key}")).await?;
        }
        Command::Project { project } => {
            db.set_default_project(&message.conv_id, &project).await?;
            chat.send_message(
                &message.conv_id,
                &format!("Default project for this channel is now {project}"),
            )
            .await?;
        }
        Command::Subscribe { jql } => {
            let subscription = db.add_subscription(&message.conv_id, &jql).await?;
            chat.send_message(
                &message.conv_id,
                &format!("Subscribed ({}): {}", subscription.id, subscription.jql),
            )
            .await?;
        }
        Command::Unsubscribe { id } => {
            let removed = db.remove_subscription(&message.conv_id, &id).await?;
            let reply = if removed {
                format!("Unsubscribed {id}")
            } else {
                format!("No subscription {id} on this channel")
            };
            chat.send_message(&message.conv_id, &reply).await?;
        }
        Command::Subscriptions => {
            let subscriptions = db.list_subscriptions(&message.conv_id).await?;

            let reply = if subscriptions.is_empty() {
                "No subscriptions for this channel.".to_string()
            } else {
                subscriptions
                    .iter()
                    .map(|sub| format!("{}: {}", sub.id, sub.jql))
                    .collect::<Vec<_>>()
                    .join("\n")
            };

            chat.send_message(&message.conv_id, &reply).await?;
        }
    }

    Ok(())
}

/// Treat free text as a summary search unless it already reads as JQL.
fn search_jql(query: &str) -> String {
    let lowered = query.to_lowercase();
    if lowered.contains('=') || lowered.contains(" order by ") {
        query.to_string()
    } else {
        format!("summary ~ \"{}\" ORDER BY updated DESC", query.replace('"', ""))
    }
}
