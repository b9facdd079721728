//! Keybase chat service integration.
//!
//! Drives the local `keybase` binary the way the Keybase bot tooling does:
//! `chat api-listen` provides the inbound message stream as line-framed
//! JSON envelopes on stdout, and `chat api` performs sends. The daemon
//! owns the session; [`KeybaseChatClient::new`] provisions a oneshot
//! device for the bot account before listening.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    types::{Res, Void},
};

use super::{ChatClient, ChatMessage, GenericChatClient, MessageHandler};

// Extra methods on `ChatClient` applied by the keybase implementation.

impl ChatClient {
    /// Creates a new Keybase chat client.
    pub async fn keybase(config: &Config) -> Res<Self> {
        let client = KeybaseChatClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// Keybase client implementation.
pub struct KeybaseChatClient {
    binary: String,
    bot_username: String,
}

impl KeybaseChatClient {
    /// Create a new Keybase chat client.
    ///
    /// Provisions a oneshot device session with the configured paper key
    /// and resolves the logged-in username, which doubles as a
    /// reachability check for the local daemon.
    #[instrument(name = "KeybaseChatClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let binary = config.keybase.binary.clone();

        let oneshot = Command::new(&binary)
            .args([
                "oneshot",
                "--username",
                &config.keybase.username,
                "--paperkey",
                &config.keybase.paperkey,
            ])
            .output()
            .await?;

        if !oneshot.status.success() {
            return Err(anyhow::anyhow!(
                "keybase oneshot failed: {}",
                String::from_utf8_lossy(&oneshot.stderr).trim()
            ));
        }

        let status = Command::new(&binary).args(["status", "-j"]).output().await?;

        if !status.status.success() {
            return Err(anyhow::anyhow!(
                "keybase status failed: {}",
                String::from_utf8_lossy(&status.stderr).trim()
            ));
        }

        let status: DaemonStatus = serde_json::from_slice(&status.stdout)?;
        let bot_username = status.username;

        if bot_username != config.keybase.username {
            warn!("Logged in as {} but configured as {}", bot_username, config.keybase.username);
        }

        info!("Keybase bot username: {}", bot_username);

        Ok(Self { binary, bot_username })
    }
}

#[async_trait]
impl GenericChatClient for KeybaseChatClient {
    fn bot_username(&self) -> &str {
        &self.bot_username
    }

    async fn listen(&self, handler: MessageHandler) -> Void {
        let mut child = Command::new(&self.binary)
            .args(["chat", "api-listen"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture api-listen stdout"))?;
        let mut lines = BufReader::new(stdout).lines();

        info!("Listening for chat messages ...");

        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => {
                    if let Some(message) = envelope.into_message() {
                        handler(message);
                    }
                }
                Err(err) => debug!("Skipping undecodable envelope: {}", err),
            }
        }

        // The stream ending means the daemon went away, which the bot
        // cannot absorb.
        let status = child.wait().await?;
        Err(anyhow::anyhow!("chat listener exited: {}", status))
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, conv_id: &str, text: &str) -> Void {
        let request = json!({
            "method": "send",
            "params": {
                "options": {
                    "conversation_id": conv_id,
                    "message": { "body": text },
                }
            }
        });

        let output = Command::new(&self.binary)
            .args(["chat", "api", "-m", &request.to_string()])
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "Failed to send message: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(())
    }
}

// Wire types.

/// Output of `keybase status -j`.
#[derive(Debug, Deserialize)]
struct DaemonStatus {
    #[serde(rename = "Username")]
    username: String,
}

/// One line of `keybase chat api-listen` output.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    msg: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    conversation_id: String,
    channel: WireChannel,
    sender: WireSender,
    content: WireContent,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireSender {
    username: String,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<WireText>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    body: String,
}

impl Envelope {
    /// Flatten the envelope into a [`ChatMessage`], dropping anything that
    /// is not a plain text chat message.
    fn into_message(self) -> Option<ChatMessage> {
        if self.kind != "chat" {
            return None;
        }

        let msg = self.msg?;
        if msg.content.kind != "text" {
            return None;
        }
        let text = msg.content.text?;

        Some(ChatMessage {
            conv_id: msg.conversation_id,
            channel: msg.channel.name,
            sender: msg.sender.username,
            body: text.body,
        })
    }
}
