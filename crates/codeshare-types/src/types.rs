//! Request and response bodies of the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /create-room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub username: String,
}

/// Response of `POST /create-room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    #[serde(rename = "roomCode")]
    pub room_code: String,
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Source text to run.
    pub code: String,
    /// Language tag, one of `javascript` or `python`.
    pub language: String,
    /// Room that should see the result, if any.
    #[serde(rename = "roomCode", default, skip_serializing_if = "Option::is_none")]
    pub room_code: Option<String>,
}

/// Response of `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ExecuteResponse {
    pub fn success(output: impl Into<String>, error: Option<String>) -> Self {
        Self {
            output: output.into(),
            error,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Query string of `GET /ws/{roomCode}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinQuery {
    #[serde(default)]
    pub username: String,
}

/// Query string of `POST /execute`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecuteQuery {
    #[serde(rename = "roomCode")]
    pub room_code: Option<String>,
}
