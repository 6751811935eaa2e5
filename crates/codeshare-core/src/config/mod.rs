//! Configuration module
//!
//! Configuration comes from an optional YAML file; the server binary lays its
//! command line flags over whatever the file provides.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;
