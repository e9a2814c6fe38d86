//! Runtime configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_START_MARKER: &str = "/*pilotscope";
pub const DEFAULT_END_MARKER: &str = "pilotscope*/";
pub const DEFAULT_TERMINATE_MESSAGE: &str = "PilotScopeFetchEnd:Back to psql!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotConfig {
    /// Token that opens the embedded directive comment.
    pub start_marker: String,

    /// Token that closes the embedded directive comment.
    pub end_marker: String,

    /// TCP connect timeout for the result round trip.
    pub connect_timeout_ms: u64,

    /// Read/write timeout for the result round trip.
    pub io_timeout_ms: u64,

    /// Request path used by the HTTP transport.
    pub http_path: String,

    /// Message carried by the abort issued when `enableTerminate` is set.
    pub terminate_message: String,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            start_marker: DEFAULT_START_MARKER.to_string(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            connect_timeout_ms: 2_000,
            io_timeout_ms: 30_000,
            http_path: "/".to_string(),
            terminate_message: DEFAULT_TERMINATE_MESSAGE.to_string(),
        }
    }
}

impl PilotConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `PILOTSCOPE_START_MARKER` / `PILOTSCOPE_END_MARKER`: directive markers
    /// - `PILOTSCOPE_CONNECT_TIMEOUT_MS`: connect timeout
    /// - `PILOTSCOPE_IO_TIMEOUT_MS`: read/write timeout
    /// - `PILOTSCOPE_HTTP_PATH`: request path for the result POST
    /// - `PILOTSCOPE_TERMINATE_MESSAGE`: abort message after finalization
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("PILOTSCOPE_START_MARKER") {
            cfg.start_marker = s;
        }

        if let Ok(s) = std::env::var("PILOTSCOPE_END_MARKER") {
            cfg.end_marker = s;
        }

        if let Ok(s) = std::env::var("PILOTSCOPE_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.connect_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("PILOTSCOPE_IO_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.io_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("PILOTSCOPE_HTTP_PATH") {
            cfg.http_path = s;
        }

        if let Ok(s) = std::env::var("PILOTSCOPE_TERMINATE_MESSAGE") {
            cfg.terminate_message = s;
        }

        cfg
    }

    /// Reject configurations the directive scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.start_marker.is_empty() || self.end_marker.is_empty() {
            return Err(Error::Config("directive markers must be non-empty".into()));
        }
        if !self.http_path.starts_with('/') {
            return Err(Error::Config(format!(
                "http path '{}' must start with '/'",
                self.http_path
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
