mod cli;
mod commands;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use stagehand_core::config::StagehandConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `completion` needs neither logging nor config
    if let Commands::Completion(ref args) = cli.command {
        clap_complete::generate(
            args.shell,
            &mut <Cli as clap::CommandFactory>::command(),
            "stagehand",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let log_guard = logging::init(cli.verbose, cli.log_file.as_deref());

    let config = match std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| StagehandConfig::find_and_load(&cwd))
    {
        Ok((config, path)) => {
            if let Some(path) = path {
                tracing::debug!("loaded config from {}", path.display());
            }
            config
        }
        Err(e) => {
            eprintln!("{} Failed to load config: {:#}", "ERROR".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Trace(args) => commands::trace::run(&config, args).await,
        Commands::Destroy(args) => commands::destroy::run(&config, args).await,
        Commands::Completion(_) => unreachable!("completion handled above"),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("\n{} {:#}", "FAILED".red().bold(), e);
            // exit() skips destructors; flush buffered log records first
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
