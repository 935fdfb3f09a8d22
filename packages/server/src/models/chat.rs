use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of messages carried in the public view.
pub const PUBLIC_CHAT_HISTORY: usize = 50;

pub const SYSTEM_SENDER: &str = "System";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub player: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn add_system_message(&mut self, content: String) {
        self.add_message(ChatMessage::new(SYSTEM_SENDER.to_string(), content));
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl ChatMessage {
    pub fn new(player: String, message: String) -> Self {
        ChatMessage {
            player,
            message,
            timestamp: Utc::now(),
        }
    }
}
