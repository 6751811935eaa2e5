//! Event types exchanged over the real-time session channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// The discriminator of a session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    /// Full snapshot of the shared source.
    Code,
    /// Cursor position of one participant.
    Cursor,
    /// Chat line.
    Chat,
    /// Request to rebroadcast the membership list.
    GetUserList,
    /// Membership list.
    UserList,
    /// Output of a sandboxed run.
    ExecutionResult,
}

impl EventType {
    /// All discriminators, in protocol order.
    pub const ALL: [EventType; 6] = [
        EventType::Code,
        EventType::Cursor,
        EventType::Chat,
        EventType::GetUserList,
        EventType::UserList,
        EventType::ExecutionResult,
    ];

    /// The wire name of this discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Code => "code",
            EventType::Cursor => "cursor",
            EventType::Chat => "chat",
            EventType::GetUserList => "getUserList",
            EventType::UserList => "userList",
            EventType::ExecutionResult => "executionResult",
        }
    }

    /// Look up a discriminator by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Whether clients are allowed to send this event to the server.
    pub fn is_client_originated(&self) -> bool {
        matches!(
            self,
            EventType::Code | EventType::Cursor | EventType::Chat | EventType::GetUserList
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a `userList` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Display name of the participant.
    pub username: String,
    /// Whether the participant created the room.
    #[serde(rename = "isHost", default)]
    pub is_host: bool,
}

impl UserEntry {
    pub fn new(username: impl Into<String>, is_host: bool) -> Self {
        Self {
            username: username.into(),
            is_host,
        }
    }
}

/// Payload of an `executionResult` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Standard output and standard error, interleaved in capture order.
    pub output: String,
    /// Set when the program ran but did not finish cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An event on the session channel.
///
/// Every variant carries exactly one payload shape. Frames are JSON objects
/// tagged by `type`, e.g. `{"type":"chat","content":"hi","username":"bob"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Full snapshot of the shared source.
    Code { content: String },
    /// Cursor position; the position blob is relayed without interpretation.
    Cursor {
        #[serde(default)]
        content: Value,
    },
    /// Chat line. `username` is filled in by the server before broadcast.
    Chat {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        username: Option<String>,
    },
    /// Ask the server to broadcast the membership list.
    GetUserList,
    /// Membership list.
    UserList { content: Vec<UserEntry> },
    /// Output of a sandboxed run.
    ExecutionResult { content: ExecutionOutcome },
}

impl Event {
    /// Create a code snapshot event.
    pub fn code(content: impl Into<String>) -> Self {
        Event::Code {
            content: content.into(),
        }
    }

    /// Create a chat event attributed to `username`.
    pub fn chat(username: impl Into<String>, content: impl Into<String>) -> Self {
        Event::Chat {
            content: content.into(),
            username: Some(username.into()),
        }
    }

    /// Create a membership list event.
    pub fn user_list(users: Vec<UserEntry>) -> Self {
        Event::UserList { content: users }
    }

    /// Create an execution result event.
    pub fn execution_result(output: impl Into<String>, error: Option<String>) -> Self {
        Event::ExecutionResult {
            content: ExecutionOutcome {
                output: output.into(),
                error,
            },
        }
    }

    /// The discriminator of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Code { .. } => EventType::Code,
            Event::Cursor { .. } => EventType::Cursor,
            Event::Chat { .. } => EventType::Chat,
            Event::GetUserList => EventType::GetUserList,
            Event::UserList { .. } => EventType::UserList,
            Event::ExecutionResult { .. } => EventType::ExecutionResult,
        }
    }

    /// Decode one text frame.
    ///
    /// The discriminator is checked before the payload so that an unknown
    /// `type` is reported as [`ProtocolError::UnknownType`] rather than as a
    /// generic shape mismatch.
    pub fn decode(frame: &str) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_str(frame).map_err(ProtocolError::Malformed)?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if EventType::from_wire(tag).is_none() {
            return Err(ProtocolError::UnknownType(tag.to_string()));
        }
        serde_json::from_value(value).map_err(ProtocolError::Malformed)
    }

    /// Encode this event as one text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(ProtocolError::Serialize)
    }
}
