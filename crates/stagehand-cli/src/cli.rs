use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::{destroy::DestroyArgs, trace::TraceArgs};

/// stagehand: follow remote build traces and supervise pipeline actions
#[derive(Parser, Debug)]
#[command(name = "stagehand", version, about, long_about = None)]
pub struct Cli {
    /// Show debug diagnostics
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Write diagnostics to a daily rotated file in this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a stream of build status events (newline-delimited JSON)
    Trace(TraceArgs),

    /// Destroy a pipeline
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completion(CompletionArgs),
}

/// Arguments for the `completion` command
#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Parse a duration such as `90s`, `5m`, `1h`, `250ms` or a bare number of seconds.
///
/// `0` is accepted and means "no limit" to the commands that take a timeout.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{}'", input))?;

    let multiplier: u64 = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => {
            return Err(format!(
                "invalid duration unit '{}' in '{}' (expected ms, s, m or h)",
                other, input
            ));
        }
    };
    let secs = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{}' is too large", input))?;
    Ok(Duration::from_secs(secs))
}
