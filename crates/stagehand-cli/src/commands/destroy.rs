use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use stagehand_core::config::StagehandConfig;
use stagehand_core::output::OutputSink;
use stagehand_core::pipeline::{self, DestroyOpts};
use stagehand_core::shell_client::ShellActionClient;
use stagehand_core::supervisor::{CtrlC, Supervisor};

use crate::cli::parse_duration;
use crate::render::TerminalSink;

/// Arguments for the `destroy` command
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Name of the pipeline (defaults to the git repository name)
    #[arg(short = 'p', long)]
    pub name: Option<String>,

    /// Namespace where the pipeline is destroyed (defaults to the configured namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Wait until the pipeline is destroyed, streaming its logs
    #[arg(short, long)]
    pub wait: bool,

    /// Destroy persistent volumes created by the pipeline
    #[arg(short = 'v', long)]
    pub volumes: bool,

    /// How long to wait for completion, zero means never (e.g. 90s, 5m, 1h)
    #[arg(short, long, default_value = "5m", value_parser = parse_duration)]
    pub timeout: Duration,
}

/// Destroy the pipeline through the configured shell commands.
pub async fn run(config: &StagehandConfig, args: DestroyArgs) -> Result<()> {
    let name = match args.name {
        Some(name) if !name.is_empty() => name,
        _ => {
            let cwd = std::env::current_dir().context("Failed to get the current directory")?;
            pipeline::pipeline_name_from_git(&cwd).await?
        }
    };
    let namespace = config.namespace_or(args.namespace.as_deref());

    let sink: Arc<dyn OutputSink> = Arc::new(TerminalSink::new());
    let client = ShellActionClient::new(config.pipeline.clone(), &namespace, Arc::clone(&sink));
    let supervisor = Supervisor::new(Arc::new(client), sink, Arc::new(CtrlC))
        .with_log_drain(config.pipeline.log_drain());

    let opts = DestroyOpts {
        name,
        namespace,
        wait: args.wait,
        destroy_volumes: args.volumes,
        timeout: args.timeout,
    };
    pipeline::destroy(&supervisor, &opts).await?;
    Ok(())
}
