//! Process-level configuration. The protocol crate's only "config" is the
//! fixed port range constant (`lookin_proto::port_prober::PORT_RANGE`); this
//! is the ordinary ambient configuration surface a long-running host process
//! needs on top of that.

use std::time::Duration;

use clap::Parser;

/// The LookinMCP bridge
///
/// Exposes a running iOS Simulator app's live view hierarchy to an AI
/// assistant over MCP stdio, by speaking LookinServer's TCP protocol.
///
/// Defaults require no flags: auto-discovers LookinServer on the fixed
/// loopback port range and logs at `info`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ProcessConfig {
    /// Increase log verbosity (-v for debug, -vv for trace). Overridden by
    /// RUST_LOG if set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override the per-request connect timeout, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub connect_timeout_ms: u64,
}

impl ProcessConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Default tracing filter directive for this verbosity, used only when
    /// `RUST_LOG` is unset.
    pub fn default_log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
