//! Message types for session conversation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Stable identifier for one session (tab).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// The model a session talks to, as a (name, provider) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub name: String,
    pub provider: String,
}

impl ModelSelection {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
        }
    }
}

/// A message in a session's log.
///
/// Immutable once appended except for `content` (mutated in place while a
/// response streams) and `is_thinking`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub is_thinking: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub can_retry: bool,
    /// The user input that produced this message, kept on error messages so
    /// the turn can be resent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_user_input: Option<String>,
    /// Set once the content has been reduced to a head/tail excerpt.
    #[serde(default)]
    pub(crate) compressed: bool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            model_name: None,
            provider: None,
            is_thinking: false,
            is_error: false,
            reasoning: None,
            can_retry: false,
            last_user_input: None,
            compressed: false,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create the in-flight assistant placeholder shown while a backend
    /// call streams.
    pub fn thinking() -> Self {
        let mut msg = Self::new(Role::Assistant, "Thinking...");
        msg.is_thinking = true;
        msg
    }

    /// Create a system error message surfaced into the log.
    pub fn system_error(
        content: impl Into<String>,
        can_retry: bool,
        last_user_input: Option<String>,
    ) -> Self {
        let mut msg = Self::new(Role::System, content);
        msg.is_error = true;
        msg.can_retry = can_retry;
        msg.last_user_input = last_user_input;
        msg
    }

    /// Tag this message with the model that produced (or will produce) it.
    pub fn with_model(mut self, model: &ModelSelection) -> Self {
        self.model_name = Some(model.name.clone());
        self.provider = Some(model.provider.clone());
        self
    }
}
