use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stagehand_core::config::StagehandConfig;
use stagehand_core::error::TraceError;
use stagehand_core::output::{OutputMode, OutputSink};
use stagehand_core::trace::{self, forward_json_lines};

use crate::render::TerminalSink;

/// Capacity of the channel between the event reader and the trace loop.
const EVENT_BUFFER: usize = 64;

/// Operation the traced events belong to
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModeArg {
    #[default]
    Build,
    Destroy,
    Test,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Build => OutputMode::Build,
            ModeArg::Destroy => OutputMode::Destroy,
            ModeArg::Test => OutputMode::Test,
        }
    }
}

/// Arguments for the `trace` command
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Which operation the events describe (selects progress wording)
    #[arg(short, long, value_enum, default_value_t = ModeArg::Build)]
    pub mode: ModeArg,

    /// File with one JSON status event per line (reads stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Follow a status event stream until it ends, rendering progress as it goes.
pub async fn run(config: &StagehandConfig, args: TraceArgs) -> Result<()> {
    let sink: Arc<dyn OutputSink> = Arc::new(TerminalSink::new());
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let reader = match args.input {
        Some(ref path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            tokio::spawn(forward_json_lines(BufReader::new(file), tx))
        }
        None => tokio::spawn(forward_json_lines(BufReader::new(tokio::io::stdin()), tx)),
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let result = trace::follow(rx, args.mode.into(), sink, config.trace.clone(), cancel).await;
    ctrl_c.abort();

    match result {
        Ok(()) => {
            let forwarded = reader
                .await
                .context("Event reader task panicked")?
                .context("Failed to read status events")?;
            tracing::debug!("trace finished after {} status events", forwarded);
            Ok(())
        }
        Err(TraceError::Cancelled) => {
            reader.abort();
            anyhow::bail!("interrupt signal received")
        }
        Err(err) => {
            reader.abort();
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_arg_maps_to_output_mode() {
        assert_eq!(OutputMode::from(ModeArg::Build), OutputMode::Build);
        assert_eq!(OutputMode::from(ModeArg::Destroy), OutputMode::Destroy);
        assert_eq!(OutputMode::from(ModeArg::Test), OutputMode::Test);
    }

    #[test]
    fn test_mode_arg_names_match_output_modes() {
        for mode in ModeArg::value_variants() {
            let name = mode
                .to_possible_value()
                .expect("every mode is selectable")
                .get_name()
                .to_string();
            assert_eq!(name, OutputMode::from(*mode).as_str());
        }
    }
}
