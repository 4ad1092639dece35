use std::sync::{Arc, LazyLock};

use indicatif::HumanBytes;
use regex::Regex;
use tracing::{debug, info};

use super::Trace;
use super::log_record::{self, DONE_STAGE, LOAD_MANIFEST_STAGE};
use crate::error::{CommandError, TraceError};
use crate::output::OutputMode;

/// Marker in a step name identifying a remote test-container run.
pub const REMOTE_TEST_MARKER: &str = "remote-run test";

/// Extracts the container name from `--name "<value>"` in a step name.
static TEST_CONTAINER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"--name\s+"([^"]+)""#).expect("valid regex"));

/// Whether the step is the backend uploading the local build context.
pub fn is_transferring_context(name: &str) -> bool {
    name.starts_with("[internal]") && name.contains("load build")
}

/// Container name of a remote test step, if the step name carries one.
pub fn test_container_name(step_name: &str) -> Option<&str> {
    TEST_CONTAINER_NAME_RE
        .captures(step_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

impl Trace {
    /// Render the current state of every registered step.
    ///
    /// Buffered log lines are drained. A stage-level error is recorded as the
    /// terminal error without interrupting the pass; a failed manifest load
    /// stops the pass immediately and is returned.
    pub fn display(&mut self, mode: OutputMode) -> Result<(), TraceError> {
        let sink = Arc::clone(&self.sink);
        let threshold = self.settings.large_context_threshold;

        for step in self.registry.steps_mut() {
            if is_transferring_context(&step.name) && step.current_transferred != 0 {
                if !self.ctx_advice_shown && step.current_transferred > threshold {
                    self.ctx_advice_shown = true;
                    sink.information(&format!(
                        "You can use '{}' file to optimize the context used to deploy your development environment.",
                        self.settings.ignore_file
                    ));
                }
                sink.set_spinner_text(&format!(
                    "Synchronizing context: {}",
                    HumanBytes(step.current_transferred)
                ));
            }

            if !step.has_logs() {
                continue;
            }
            sink.set_spinner_text(mode.progress_text());

            for line in std::mem::take(&mut step.log_lines) {
                if line.is_empty() {
                    continue;
                }
                let record = match log_record::decode(&line) {
                    Ok(record) => record,
                    Err(err) => {
                        debug!("could not parse {}: {}", line, err);
                        continue;
                    }
                };
                if record.stage.is_empty() {
                    info!("received log without stage: {}", record.message);
                    continue;
                }

                sink.set_stage(&record.stage);
                match record.stage.as_str() {
                    DONE_STAGE => {}
                    LOAD_MANIFEST_STAGE => {
                        if record.is_error() {
                            sink.set_stage("");
                            return Err(TraceError::ManifestLoad(record.message));
                        }
                    }
                    stage => {
                        if !self.announced_stages.contains(stage) {
                            if mode.announces_stages() {
                                sink.information(&format!("Running stage '{}'", stage));
                            }
                            self.announced_stages.insert(stage.to_string());
                        }
                        if record.is_error() {
                            if self.terminal_error.is_none() {
                                self.terminal_error = Some(
                                    CommandError {
                                        stage: record.stage.clone(),
                                        message: record.message,
                                        output: mode,
                                    }
                                    .into(),
                                );
                            }
                        } else {
                            sink.println(&record.message);
                        }
                    }
                }
            }
            sink.set_stage("");
        }

        Ok(())
    }

    /// Drop every completed step, announcing cached remote test containers.
    pub fn remove_completed_steps(&mut self) {
        for step in self.registry.drain_where(|step| step.completed) {
            if step.cached && step.name.contains(REMOTE_TEST_MARKER) {
                match test_container_name(&step.name) {
                    Some(name) => self
                        .sink
                        .information(&format!("Skipping test container '{}', CACHED", name)),
                    None => self.sink.information("Skipping test container, CACHED"),
                }
            }
        }
    }
}
