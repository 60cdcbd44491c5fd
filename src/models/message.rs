//! Chat message record flowing through the pipeline.

use super::{LevelDefinition, SpecialLevel};
use crate::SYSTEM_USER;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A normalized chat message as supplied by the chat source adapter.
///
/// Fields this crate does not know about are kept in `extra` and serialized
/// back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on messages generated by the host or by other modules.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system_msg: bool,
    /// Present when the message is a chat command. The payload is opaque here.
    ///
    /// Presence of the key is what counts: `"command": null` is still a
    /// command and is kept as `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub command: Option<Value>,
    /// Resolved level of the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<LevelDefinition>,
    /// Special levels of the author, possibly stacked by several modules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub s_levels: Vec<SpecialLevel>,
    /// Pass-through fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Creates a system notification.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            user: Some(SYSTEM_USER.to_string()),
            text: Some(text.into()),
            system_msg: true,
            ..Self::default()
        }
    }

    /// Marks the message as a command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<Value>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Returns true if the message is a chat command.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        self.command.is_some()
    }

    /// Returns true if the message originates from the system.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.system_msg
    }
}

/// Maps any present value, `null` included, to `Some`.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
