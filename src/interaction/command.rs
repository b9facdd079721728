//! Parsing of `!jira` chat commands.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search issues by free text or JQL.
    Search { query: String },
    /// Create an issue, optionally naming the project.
    Create {
        project: Option<String>,
        summary: String,
        description: String,
    },
    /// Comment on an issue.
    Comment { key: String, body: String },
    /// Set the conversation's default project.
    Project { project: String },
    /// Subscribe the conversation to a JQL feed.
    Subscribe { jql: String },
    /// Remove a feed subscription.
    Unsubscribe { id: String },
    /// List the conversation's subscriptions.
    Subscriptions,
    /// Usage text.
    Help,
}

/// Usage text replied to `help` and to anything malformed.
pub const USAGE: &str = "\
!jira search <query>
!jira create [PROJECT] <summary> [: <description>]
!jira comment <KEY> <text>
!jira project <PROJECT>
!jira subscribe <jql>
!jira unsubscribe <id>
!jira subscriptions
!jira help";

/// Whether a message body is addressed to the bot.
pub fn is_command(body: &str) -> bool {
    body.trim_start().starts_with("!jira")
}

/// Parse a message body into a command.
///
/// Returns `None` for anything malformed; the caller replies with [`USAGE`].
pub fn parse(body: &str) -> Option<Command> {
    let rest = body.trim().strip_prefix("!jira")?.trim_start();

    let (verb, args) = match rest.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (rest, ""),
    };

    match verb {
        "search" if !args.is_empty() => Some(Command::Search { query: args.to_string() }),
        "create" if !args.is_empty() => parse_create(args),
        "comment" => {
            let (key, text) = args.split_once(char::is_whitespace)?;
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Command::Comment {
                key: key.to_uppercase(),
                body: text.to_string(),
            })
        }
        "project" if !args.is_empty() && !args.contains(char::is_whitespace) => Some(Command::Project {
            project: args.to_uppercase(),
        }),
        "subscribe" if !args.is_empty() => Some(Command::Subscribe { jql: args.to_string() }),
        "unsubscribe" if !args.is_empty() && !args.contains(char::is_whitespace) => {
            Some(Command::Unsubscribe { id: args.to_string() })
        }
        "subscriptions" if args.is_empty() => Some(Command::Subscriptions),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// `create [PROJECT] <summary> [: <description>]`.
fn parse_create(args: &str) -> Option<Command> {
    let (project, rest) = match args.split_once(char::is_whitespace) {
        Some((first, rest)) if looks_like_project_key(first) => (Some(first.to_string()), rest.trim()),
        _ => (None, args),
    };

    let (summary, description) = match rest.split_once(':') {
        Some((summary, description)) => (summary.trim(), description.trim()),
        None => (rest, ""),
    };

    if summary.is_empty() {
        return None;
    }

    Some(Command::Create {
        project,
        summary: summary.to_string(),
        description: description.to_string(),
    })
}

/// The first token counts as a project key when it is short uppercase
/// alphanumeric, the way Jira project keys are.
fn looks_like_project_key(token: &str) -> bool {
    (2..=10).contains(&token.len()) && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
