//! Wire protocol for collaborative code sessions
//!
//! This crate is the shared contract between the session server and its
//! browser clients: the tagged event union carried over the real-time
//! channel, and the JSON bodies of the HTTP endpoints.
//!
//! ## Example
//!
//! ```rust
//! use codeshare_types::{Event, EventType};
//!
//! let event = Event::decode(r#"{"type":"chat","content":"hi"}"#).unwrap();
//! assert_eq!(event.event_type(), EventType::Chat);
//! ```

pub mod error;
pub mod events;
pub mod types;

pub use error::*;
pub use events::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_request_room_code_is_optional() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"code":"print(1)","language":"python"}"#).unwrap();
        assert_eq!(req.room_code, None);

        let req: ExecuteRequest = serde_json::from_str(
            r#"{"code":"print(1)","language":"python","roomCode":"abc123"}"#,
        )
        .unwrap();
        assert_eq!(req.room_code.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_execute_response_shapes() {
        let ok = serde_json::to_value(ExecuteResponse::success("hi\n", None)).unwrap();
        assert_eq!(ok, serde_json::json!({"output": "hi\n"}));

        let err = serde_json::to_value(ExecuteResponse::failure("unsupported language: ruby"))
            .unwrap();
        assert_eq!(err["error"], "unsupported language: ruby");
    }

    #[test]
    fn test_create_room_response_uses_camel_case() {
        let body = serde_json::to_string(&CreateRoomResponse {
            room_code: "k3x9qa".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"roomCode":"k3x9qa"}"#);
    }
}
