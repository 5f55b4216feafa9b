use clap::Parser;
use tron_transfer_watcher::cli::{Cli, CliHandler};
use tron_transfer_watcher::config::AppConfig;
use tron_transfer_watcher::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging)?;

    let handler = CliHandler::new(config);
    if let Err(e) = handler.execute(&cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
