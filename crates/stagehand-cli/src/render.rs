use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use stagehand_core::output::OutputSink;

/// Create a styled spinner for long-running remote work.
///
/// Uses a consistent style across all commands: `{spinner} {msg}`
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[derive(Default)]
struct SpinnerState {
    bar: Option<ProgressBar>,
    text: String,
    stage: String,
}

impl SpinnerState {
    fn message(&self) -> String {
        if self.stage.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", format!("[{}]", self.stage).dimmed(), self.text)
        }
    }

    fn refresh(&self) {
        if let Some(ref bar) = self.bar {
            bar.set_message(self.message());
        }
    }
}

/// Terminal output: one indicatif spinner plus colored scrollback lines.
///
/// Lines printed while the spinner runs are written above it.
#[derive(Default)]
pub struct TerminalSink {
    state: Mutex<SpinnerState>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SpinnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn out(&self, line: String) {
        let state = self.state();
        match state.bar {
            Some(ref bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    fn err(&self, line: String) {
        let state = self.state();
        match state.bar {
            Some(ref bar) => bar.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }
}

impl OutputSink for TerminalSink {
    fn start_spinner(&self) {
        let mut state = self.state();
        if state.bar.is_none() {
            state.bar = Some(create_spinner(&state.message()));
        }
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.state().bar.take() {
            bar.finish_and_clear();
        }
    }

    fn set_spinner_text(&self, text: &str) {
        let mut state = self.state();
        state.text = text.to_string();
        state.refresh();
    }

    fn println(&self, line: &str) {
        self.out(line.to_string());
    }

    fn set_stage(&self, stage: &str) {
        let mut state = self.state();
        state.stage = stage.to_string();
        state.refresh();
    }

    fn information(&self, message: &str) {
        self.out(format!("{} {}", "i".blue().bold(), message));
    }

    fn success(&self, message: &str) {
        self.out(format!("{} {}", "✓".green().bold(), message));
    }

    fn warning(&self, message: &str) {
        self.err(format!("{} {}", "WARNING:".yellow().bold(), message));
    }
}
