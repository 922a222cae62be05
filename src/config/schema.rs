//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Ports a server picks from when none is configured.
pub const PORT_RANGE: RangeInclusive<u16> = 6000..=8000;

/// Root configuration for a stub server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (e.g., "127.0.0.1").
    pub host: String,

    /// Port to bind. A random port from [`PORT_RANGE`] is drawn at server
    /// construction when unset.
    pub port: Option<u16>,

    /// Worker threads driving accepted connections.
    pub workers: usize,

    /// Maximum concurrently served connections (backpressure).
    pub max_connections: usize,

    /// How long `stop` waits for in-flight exchanges, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            workers: 1,
            max_connections: 256,
            drain_timeout_ms: 5_000,
        }
    }
}
