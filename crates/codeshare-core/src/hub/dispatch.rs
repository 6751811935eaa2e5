//! Routing of frames received from a client into its room.

use codeshare_types::{Event, EventType, ProtocolError};

use super::room::{BroadcastReport, Frame, Room};

/// What the room did with one inbound frame.
#[derive(Debug)]
pub enum InboundOutcome {
    /// The frame (or its re-wrapped form) was broadcast.
    Broadcast {
        event_type: EventType,
        report: BroadcastReport,
    },
    /// A server-only event arrived from a client and was dropped.
    Ignored(EventType),
    /// The frame could not be decoded and was dropped.
    Rejected(ProtocolError),
}

/// Handle one text frame sent by `sender` in `room`.
///
/// Nothing here fails the connection: bad frames are logged and skipped.
pub fn dispatch_inbound(room: &Room, sender: &str, frame: &str) -> InboundOutcome {
    let event = match Event::decode(frame) {
        Ok(event) => event,
        Err(e) => {
            if e.is_unknown_type() {
                log::warn!("Unknown message type from {} in room {}: {}", sender, room.code(), e);
            } else {
                log::warn!("Error decoding frame from {} in room {}: {}", sender, room.code(), e);
            }
            return InboundOutcome::Rejected(e);
        }
    };

    let event_type = event.event_type();
    let report = match event {
        // Code and cursor frames are relayed byte for byte.
        Event::Code { content } => room.publish_source(content, Frame::from(frame)),
        Event::Cursor { .. } => room.broadcast_frame(Frame::from(frame)),
        Event::Chat { content, .. } => room.broadcast(&Event::chat(sender, content)),
        Event::GetUserList => room.broadcast_user_list(),
        Event::UserList { .. } | Event::ExecutionResult { .. } => {
            log::warn!(
                "Ignoring server-only {} event from {} in room {}",
                event_type,
                sender,
                room.code()
            );
            return InboundOutcome::Ignored(event_type);
        }
    };

    InboundOutcome::Broadcast { event_type, report }
}
