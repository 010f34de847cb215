use anyhow::Result;
use clap::Parser;
use clockprobe::logging::init_logging_with_config;
use clockprobe::server::{bind_socket, Dispatcher, ServerConfig};
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let config = ServerConfig::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address();

    let socket = bind_socket(&addr)?;

    info!(
        address = %addr,
        drop_rate = config.drop_rate,
        encoding = config.encoding().name(),
        seeded = config.seed.is_some(),
        "Clockprobe server ready"
    );

    let mut dispatcher = Dispatcher::from_config(&config);
    dispatcher.run(&socket)?;

    Ok(())
}
