use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Streaming completion relay
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Relays streamed LLM completions to browser clients")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "RELAY_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "info", env = "RELAY_LOG")]
    pub log_filter: String,

    /// Seconds open streams may take to finish after a shutdown signal
    #[arg(long, default_value_t = 10)]
    pub shutdown_grace_secs: u64,
}

impl Args {
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
