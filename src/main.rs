mod bot;
mod cli;
mod commands;
mod config;
mod convert;
mod error;
mod logging;
mod mcp;
mod page_range;
mod pdf;
mod pipeline;
mod print;
mod session;
mod storage;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.config.verbose, cli.config.log_file.as_deref())?;

    match cli.command {
        Commands::Serve => {
            mcp::run_server(&cli.config).await?;
        }
        Commands::Print {
            path,
            pages,
            job_name,
        } => {
            let config = cli.config.clone();
            // Conversion and printing block.
            tokio::task::spawn_blocking(move || {
                commands::print::run(&config, &path, &pages, job_name.as_deref())
            })
            .await??;
        }
        Commands::Info { path } => {
            commands::info::run(&cli.config, &path)?;
        }
        Commands::Check { pages, total } => {
            commands::check::run(&pages, total)?;
        }
        Commands::Printers => {
            commands::printers::run(&cli.config)?;
        }
    }

    Ok(())
}
