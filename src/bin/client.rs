use anyhow::Result;
use clap::Parser;
use clockprobe::client::{run_session, Config, ProgressTracker, Reporter, UdpProbeSocket};
use clockprobe::logging::init_logging_with_config;
use std::io;
use std::net::SocketAddr;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments
    let config = Config::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Client failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let server = SocketAddr::V4(config.server());

    let mut socket = UdpProbeSocket::bind("0.0.0.0:0")?;
    socket.connect(server)?;

    let session_config = config.session_config();
    info!(
        server = %server,
        count = session_config.count,
        timeout_secs = config.timeout,
        encoding = session_config.encoding.name(),
        "Starting probe session"
    );

    let progress = if config.progress {
        ProgressTracker::new(config.count)?
    } else {
        ProgressTracker::hidden()
    };

    let session = run_session(&mut socket, &session_config, &progress)?;
    progress.finish();

    Reporter::write_report(&session, &mut io::stdout().lock())?;

    if config.summary {
        eprintln!("{}", Reporter::summary(&session)?);
    }

    Ok(())
}
