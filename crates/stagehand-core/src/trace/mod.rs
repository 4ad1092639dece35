//! Aggregation of a backend's live status stream into per-step state.
//!
//! A [`Trace`] is created per traced operation and fed one [`StatusEvent`]
//! batch at a time by [`follow`]. After every batch the display pass renders
//! buffered logs and completed steps are pruned.

mod display;
mod driver;
pub mod log_record;
pub mod registry;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::TraceSettings;
use crate::error::TraceError;
use crate::events::StatusEvent;
use crate::output::OutputSink;

pub use driver::{follow, forward_json_lines};
pub use registry::{StepRegistry, StepState};

/// In-memory state for one traced run.
pub struct Trace {
    registry: StepRegistry,
    announced_stages: HashSet<String>,
    terminal_error: Option<TraceError>,
    ctx_advice_shown: bool,
    settings: TraceSettings,
    sink: Arc<dyn OutputSink>,
}

impl Trace {
    pub fn new(sink: Arc<dyn OutputSink>, settings: TraceSettings) -> Self {
        Self {
            registry: StepRegistry::new(),
            announced_stages: HashSet::new(),
            terminal_error: None,
            ctx_advice_shown: false,
            settings,
            sink,
        }
    }

    /// Apply one batch of status events.
    ///
    /// Returns an error only when a vertex descriptor reports a failure; the
    /// trace must not be used after that.
    pub fn update(&mut self, event: &StatusEvent) -> Result<(), TraceError> {
        for vertex in &event.vertexes {
            let step = self
                .registry
                .upsert(&vertex.digest, || StepState::new(&vertex.name, vertex.cached));
            if !vertex.error.is_empty() {
                return Err(TraceError::StepFailed {
                    name: vertex.name.clone(),
                    error: vertex.error.clone(),
                });
            }
            if vertex.cached {
                step.cached = true;
            }
            if vertex.completed.is_some() {
                step.latch_completed();
            }
        }

        for status in &event.statuses {
            // Statuses for unregistered vertexes are not expected from the backend.
            let Some(step) = self.registry.get_mut(&status.vertex) else {
                continue;
            };
            step.apply_status(status.completed.is_some(), status.current, status.total);
        }

        for log in &event.logs {
            let Some(step) = self.registry.get_mut(&log.vertex) else {
                continue;
            };
            step.log_lines
                .extend(log_record::split_lines(&log.data).map(str::to_string));
        }

        Ok(())
    }

    /// The first terminal error recorded while rendering, if any.
    pub fn terminal_error(&self) -> Option<&TraceError> {
        self.terminal_error.as_ref()
    }

    pub fn take_terminal_error(&mut self) -> Option<TraceError> {
        self.terminal_error.take()
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn announced_stages(&self) -> &HashSet<String> {
        &self.announced_stages
    }
}
