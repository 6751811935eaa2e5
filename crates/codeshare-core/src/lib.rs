//! Engine behind collaborative code sessions.
//!
//! Two subsystems meet here:
//!
//! - **Room hub**: named rooms, each fanning session events out to its
//!   connected members and remembering the latest shared source.
//! - **Sandbox**: runs a submitted JavaScript or Python program in a
//!   throwaway container with a hard deadline, then destroys everything it
//!   created.
//!
//! [`ExecutionBridge`] ties them together by publishing finished runs to the
//! room that asked for them.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod hub;
pub mod sandbox;

pub use bridge::ExecutionBridge;
pub use config::*;
pub use errors::{ConfigError, SandboxError};
pub use hub::{dispatch_inbound, InboundOutcome, Room, RoomRegistry};
pub use sandbox::{
    CodeExecutor, DockerRuntime, ExecutionRequest, ExecutionResult, Language, RecipeBook,
    SandboxExecutor,
};
