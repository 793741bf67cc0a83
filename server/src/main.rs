// server/src/main.rs

use anyhow::Result;
use dispatch_server::cli::cli::start_cli;
use log::{info, warn};
use tokio::signal::unix::{signal, SignalKind};

async fn wait_for_signal() {
    let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            warn!("Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // A reservation already taken must be recorded, so a signal never cuts
    // the running command short.
    let mut command = tokio::spawn(start_cli());
    tokio::select! {
        result = &mut command => return result?,
        _ = wait_for_signal() => info!("Shutdown requested; waiting for the running command to finish"),
    }
    command.await?
}
