//! Process configuration.
//!
//! Resolved once at startup from command-line flags, falling back to
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{ClientError, Result};
use crate::pager::{PagerConfig, DEFAULT_ENQUEUE_TIMEOUT};

/// AKI alerting client for an MLLP feed.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// MLLP server to connect to (host:port)
    #[arg(long, env = "MLLP_ADDRESS")]
    pub mllp_address: String,

    /// Pager service (host:port)
    #[arg(long, env = "PAGER_ADDRESS")]
    pub pager_address: String,

    /// Historical creatinine results, loaded when the database is new
    #[arg(long, default_value = "/data/history.csv")]
    pub history: PathBuf,

    /// Patient database file
    #[arg(long, default_value = "/state/patients.db")]
    pub database: PathBuf,

    /// JSON linear model ({"weights": [...], "bias": ...}); threshold rule if absent
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Timeout for one pager request, in milliseconds
    #[arg(long, default_value = "2000")]
    pub pager_timeout_ms: u64,

    /// Maximum queued pages
    #[arg(long, default_value = "256")]
    pub pager_queue: usize,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// MLLP `(host, port)`.
    pub fn mllp_endpoint(&self) -> Result<(String, u16)> {
        endpoint("MLLP_ADDRESS", &self.mllp_address)
    }

    /// Pager `(host, port)`.
    pub fn pager_endpoint(&self) -> Result<(String, u16)> {
        endpoint("PAGER_ADDRESS", &self.pager_address)
    }

    /// Pager task settings.
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            queue_capacity: self.pager_queue.max(1),
            call_timeout: Duration::from_millis(self.pager_timeout_ms),
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}

/// Split `host:port` into its parts.
///
/// When there is no `:` separator, or the text after the last one is not a
/// port number, the whole address is returned as the host with no port.
pub fn split_host_port(address: &str) -> (String, Option<u16>) {
    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (address.to_string(), None),
        },
        None => (address.to_string(), None),
    }
}

fn endpoint(name: &str, address: &str) -> Result<(String, u16)> {
    match split_host_port(address) {
        (host, _) if host.is_empty() => {
            Err(ClientError::Config(format!("{} '{}' has no host", name, address)))
        }
        (host, Some(port)) => Ok((host, port)),
        (_, None) => Err(ClientError::Config(format!(
            "{} '{}' must be host:port",
            name, address
        ))),
    }
}
