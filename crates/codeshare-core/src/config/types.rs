//! Configuration type definitions
//!
//! Every field has a default so an empty YAML document is a valid
//! configuration. Durations are expressed in whole seconds on the wire.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CodeshareConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_logging: bool,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: default_cors_origins(),
            enable_logging: true,
            max_body_size: default_max_body_size(),
        }
    }
}

/// Settings for rooms and client sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    /// Frames a client may have pending before it is evicted.
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: default_queue_capacity(),
            keepalive_interval_secs: default_keepalive_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl HubConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

/// Settings for the execution sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Wall-clock budget of one execution, counted from submission.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Time a timed-out container gets between SIGTERM and SIGKILL.
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    /// Directory holding `Dockerfile.<language>` overrides.
    #[serde(default)]
    pub recipes_dir: Option<PathBuf>,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: Option<u64>,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: Option<i64>,
    #[serde(default = "default_true")]
    pub network_disabled: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            image_prefix: default_image_prefix(),
            recipes_dir: None,
            memory_limit_mb: default_memory_limit_mb(),
            pids_limit: default_pids_limit(),
            network_disabled: true,
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

impl CodeshareConfig {
    /// Reject values the rest of the system cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "server.bind_addr '{}' is not a socket address: {}",
                    self.server.bind_addr, e
                ))
            })?;
        if self.hub.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "hub.outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.hub.keepalive_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "hub.keepalive_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.sandbox.image_prefix.trim().is_empty()
            || self.sandbox.image_prefix.chars().any(|c| c.is_ascii_uppercase())
        {
            return Err(ConfigError::Invalid(format!(
                "sandbox.image_prefix '{}' is not a valid lowercase image name",
                self.sandbox.image_prefix
            )));
        }
        Ok(())
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_image_prefix() -> String {
    "codeshare-exec".to_string()
}

fn default_true() -> bool { true }
fn default_max_body_size() -> usize { 1024 * 1024 }
fn default_queue_capacity() -> usize { 256 }
fn default_keepalive_secs() -> u64 { 5 }
fn default_max_frame_bytes() -> usize { 64 * 1024 }
fn default_timeout_secs() -> u64 { 30 }
fn default_stop_grace_secs() -> u64 { 2 }
fn default_memory_limit_mb() -> Option<u64> { Some(256) }
fn default_pids_limit() -> Option<i64> { Some(64) }
