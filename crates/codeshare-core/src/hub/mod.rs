//! Real-time room broadcast hub.
//!
//! A [`RoomRegistry`] maps room codes to [`Room`]s. Each room fans events out
//! to its members through their bounded outbound queues and evicts members
//! that cannot keep up, so a broadcast never waits on a consumer.

pub mod dispatch;
pub mod registry;
pub mod room;

pub use dispatch::{dispatch_inbound, InboundOutcome};
pub use registry::RoomRegistry;
pub use room::{outbound_queue, BroadcastReport, ClientId, Frame, Inbox, Outbox, Room};
