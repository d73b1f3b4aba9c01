use std::sync::Arc;

use clap::Parser;
use slog::{info, Drain};

mod cli;
mod config;
mod listener;
mod socks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.to_config()?;
    let logger = setup_logger(cli.verbose);

    let server = Arc::new(
        socks::Server::new(config, logger.clone())
            .on_started({
                let logger = logger.clone();
                move || info!(logger, "service started")
            })
            .on_stopped({
                let logger = logger.clone();
                move || info!(logger, "service stopped")
            }),
    );
    server.start().await?;

    server.run_until(tokio::signal::ctrl_c()).await
}

fn setup_logger(verbose: u8) -> slog::Logger {
    let level = if verbose > 0 {
        slog::Level::Debug
    } else {
        slog::Level::Info
    };
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(level)
        .fuse();
    slog::Logger::root(drain, slog::o!())
}
