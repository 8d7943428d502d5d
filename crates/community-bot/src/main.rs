mod cli;
mod commands;
mod router;
mod server;

use clap::Parser;
use human_panic::setup_panic;

use crate::cli::{Cli, run_cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_panic!();
    // .env files first so clap's env fallbacks can see them
    shared::env::configure_env()?;
    shared::logging::configure_logging()?;

    let cli = Cli::parse();

    run_cli(cli).await
}
