use std::collections::HashMap;

/// Live state of one vertex in the step graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepState {
    pub name: String,
    /// Sticky: once set it is never cleared.
    pub cached: bool,
    /// Latched when a vertex descriptor carries a completion marker.
    pub vertex_completed: bool,
    /// Mirrors the completion marker of the most recent status update.
    pub status_completed: bool,
    /// Effective completion: the most recent write from either source.
    /// A later status without a marker can revert a latched vertex.
    pub completed: bool,
    pub current_transferred: u64,
    pub total_transferred: u64,
    /// Raw log lines buffered until the next display pass.
    pub log_lines: Vec<String>,
}

impl StepState {
    pub fn new(name: impl Into<String>, cached: bool) -> Self {
        Self {
            name: name.into(),
            cached,
            ..Self::default()
        }
    }

    pub fn has_logs(&self) -> bool {
        !self.log_lines.is_empty()
    }

    pub(crate) fn latch_completed(&mut self) {
        self.vertex_completed = true;
        self.completed = true;
    }

    pub(crate) fn apply_status(&mut self, completed: bool, current: u64, total: u64) {
        self.status_completed = completed;
        self.completed = completed;
        self.current_transferred = current;
        self.total_transferred = total;
    }
}

/// Keyed store of per-step state. Owned by a single consumer task.
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: HashMap<String, StepState>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the step for `id`, creating it from `defaults` on first sight.
    /// Existing fields are never overwritten.
    pub fn upsert(&mut self, id: &str, defaults: impl FnOnce() -> StepState) -> &mut StepState {
        self.steps.entry(id.to_string()).or_insert_with(defaults)
    }

    pub fn get(&self, id: &str) -> Option<&StepState> {
        self.steps.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut StepState> {
        self.steps.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<StepState> {
        self.steps.remove(id)
    }

    pub fn for_each(&self, mut f: impl FnMut(&str, &StepState)) {
        for (id, step) in &self.steps {
            f(id, step);
        }
    }

    pub fn steps_mut(&mut self) -> impl Iterator<Item = &mut StepState> {
        self.steps.values_mut()
    }

    /// Remove every step matching `predicate`, returning the removed steps.
    pub fn drain_where(&mut self, predicate: impl Fn(&StepState) -> bool) -> Vec<StepState> {
        let ids: Vec<String> = self
            .steps
            .iter()
            .filter(|(_, step)| predicate(step))
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.steps.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
