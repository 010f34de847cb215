//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the clockprobe server.

use crate::logging::validate_level;
use crate::protocol::Encoding;
use crate::server::error::{Result, ServerError};
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "clockprobe-server")]
#[command(about = "UDP echo server that timestamps clockprobe probes")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Bind port
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Percentage of probes to drop unanswered [0-100]
    #[arg(short, long = "drop", default_value_t = 0)]
    pub drop_rate: u8,

    /// Use the compact (packed) wire encoding
    #[arg(short, long)]
    pub condensed: bool,

    /// Seed for the loss simulation (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl ServerConfig {
    /// Returns the full bind address as a string (bind:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn encoding(&self) -> Encoding {
        Encoding::from_condensed(self.condensed)
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating server configuration");

        if self.port == 0 {
            return Err(ServerError::Config("port must be > 0".into()));
        }

        if self.drop_rate > 100 {
            return Err(ServerError::Config("drop must be between 0 and 100".into()));
        }

        validate_level(&self.log_level).map_err(ServerError::Config)?;

        debug!("Server configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}
