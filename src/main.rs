//! shout: echo the first line of a request back in uppercase.
//!
//! Features:
//! - One connection per run by default, or a sequential accept loop
//! - Configuration via CLI arguments or TOML file

use shout::config::Config;
use shout::server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        backlog = config.backlog,
        buffer_size = config.buffer_size,
        mode = ?config.mode,
        "Starting shout server"
    );

    match Server::new(config).run() {
        Ok(report) => {
            info!(served = report.served, failed = report.errors.len(), "Goodbye");
            match report.errors.into_iter().next() {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            Err(e.into())
        }
    }
}
