pub mod keybase;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::Void;

// Types.

/// Callback invoked for every decoded inbound message.
///
/// Handlers must not block; long work is spawned off by the handler itself.
pub type MessageHandler = Box<dyn Fn(ChatMessage) + Send + Sync>;

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the core functionality for interacting with chat platforms
/// like Keybase. Implementing this trait allows different chat services to be used
/// with jirabot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the username the bot is running as.
    ///
    /// Used to drop the bot's own messages so feed announcements cannot
    /// loop back into the command handler.
    fn bot_username(&self) -> &str;

    /// Block on the inbound message stream.
    ///
    /// Invokes `handler` for every decoded message until the stream ends;
    /// the stream ending is an error, since the bot cannot operate without it.
    async fn listen(&self, handler: MessageHandler) -> Void;

    /// Send a message to a conversation.
    async fn send_message(&self, conv_id: &str, text: &str) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

/// A single inbound chat message, decoded from the transport envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Conversation the message arrived on.
    pub conv_id: String,
    /// Channel name as rendered by the chat service.
    pub channel: String,
    /// Username of the sender.
    pub sender: String,
    /// Message text.
    pub body: String,
}
