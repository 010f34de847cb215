use crate::client::error::{ClientError, Result};
use crate::logging::validate_level;
use crate::protocol::Encoding;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "clockprobe-client")]
#[command(about = "Measure clock offset and round-trip delay against a clockprobe server")]
pub struct Config {
    /// Server IPv4 address
    #[arg(short = 'a', long = "addr", default_value = "127.0.0.1")]
    pub addr: Ipv4Addr,

    /// Server port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Number of probes to send
    #[arg(short = 'n', long = "num", default_value_t = 10)]
    pub count: u32,

    /// Idle timeout in seconds (0 waits for every echo)
    #[arg(short, long, default_value_t = 0)]
    pub timeout: u64,

    /// Use the compact (packed) wire encoding
    #[arg(short, long)]
    pub condensed: bool,

    /// Print an aggregate summary to stderr after the report
    #[arg(long)]
    pub summary: bool,

    /// Show a progress bar on stderr while collecting echoes
    #[arg(long)]
    pub progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

/// Parameters the session engine needs, resolved from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub count: u32,
    /// `None` waits indefinitely for all echoes
    pub idle_timeout: Option<Duration>,
    pub encoding: Encoding,
}

impl Config {
    /// Returns the server endpoint
    pub fn server(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.port)
    }

    /// Returns the idle timeout, or `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn encoding(&self) -> Encoding {
        Encoding::from_condensed(self.condensed)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            count: self.count,
            idle_timeout: self.idle_timeout(),
            encoding: self.encoding(),
        }
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        if self.port == 0 {
            return Err(ClientError::Config("port must be > 0".into()));
        }
        if self.count == 0 {
            return Err(ClientError::Config("num must be > 0".into()));
        }
        validate_level(&self.log_level).map_err(ClientError::Config)?;
        debug!("Configuration validated successfully");
        Ok(())
    }
}
