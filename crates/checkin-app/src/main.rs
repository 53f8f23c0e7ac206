use anyhow::Result;
use clap::Parser;

use checkin_app::{commands, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    checkin_core::init()?;

    let cli = Cli::parse();
    let mut config = checkin_core::Config::load()?;
    if let Some(url) = cli.backend_url.clone() {
        config.backend.url = url;
    }

    let app = checkin_core::App::from_config(config)?;
    for warning in app.warnings() {
        tracing::warn!("Config: {}", warning);
    }

    if let Err(err) = commands::run(&app, cli.command).await {
        tracing::debug!("Command failed: {:?}", err);
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }

    Ok(())
}
