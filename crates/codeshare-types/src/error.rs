//! Error types for protocol decoding.

use thiserror::Error;

/// Errors that can occur while decoding or encoding session frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not valid JSON, or its payload did not match the shape
    /// expected for its discriminator.
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame is a JSON value without a string `type` field.
    #[error("Frame has no \"type\" discriminator")]
    MissingType,

    /// The discriminator is not part of the protocol.
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    /// An event could not be serialized.
    #[error("Failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ProtocolError {
    /// Whether the frame was rejected only because of its discriminator.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, ProtocolError::UnknownType(_))
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
