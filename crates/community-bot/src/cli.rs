use std::error::Error;

use clap::{Parser, Subcommand};
use shared::error::CommonError;

use crate::commands::{self, serve::ServeParams};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "community-bot", version = CLI_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[allow(clippy::large_enum_variant)]
#[derive(Subcommand)]
pub enum Commands {
    /// Run the Slack webhook server and welcome new channel members
    Serve(ServeParams),
    /// Show the bot version
    Version,
}

fn log_error_chain(err: &(dyn Error)) {
    let mut current: Option<&(dyn Error)> = err.source();

    while let Some(e) = current {
        eprintln!("Caused by: {e}");
        current = e.source();
    }
}

fn handle_error(err: &CommonError) {
    eprintln!("Error: {err}");
    log_error_chain(err);
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let cmd_res = match cli.command {
        Commands::Serve(params) => commands::serve::cmd_serve(params).await,
        Commands::Version => {
            println!("community-bot version: {CLI_VERSION}");
            Ok(())
        }
    };

    if let Err(e) = cmd_res {
        handle_error(&e);
    }
    Ok(())
}
