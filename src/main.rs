use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gator::app::AppContext;
use gator::cli::{commands, Cli};
use gator::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays clean on stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let mut ctx = AppContext::new(config)?;

    let registry = commands::builtin_registry().await;
    registry.run(cli.command, &mut ctx, &cli.args).await?;

    Ok(())
}
