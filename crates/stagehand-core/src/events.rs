use serde::{Deserialize, Serialize};

/// One batch of status updates emitted by the build backend.
///
/// A batch may carry any mix of vertex descriptors, status updates and log
/// chunks. Within a batch, vertexes are applied before statuses and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusEvent {
    pub vertexes: Vec<Vertex>,
    pub statuses: Vec<VertexStatus>,
    pub logs: Vec<VertexLog>,
}

/// Descriptor of one node in the backend's step graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vertex {
    /// Stable content-addressed identifier of the step.
    pub digest: String,
    pub name: String,
    pub cached: bool,
    /// Non-empty when the backend reports the step as failed.
    pub error: String,
    /// Completion timestamp; its presence is the completion marker.
    pub completed: Option<String>,
}

/// Progress of a step that streams external content (e.g. the build context upload).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexStatus {
    /// Digest of the vertex this status belongs to.
    pub vertex: String,
    pub current: u64,
    pub total: u64,
    pub completed: Option<String>,
}

/// A chunk of raw log output for a step. May contain several newline-separated lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexLog {
    pub vertex: String,
    pub data: String,
}

impl StatusEvent {
    /// Decode one newline-delimited JSON status event.
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn is_empty(&self) -> bool {
        self.vertexes.is_empty() && self.statuses.is_empty() && self.logs.is_empty()
    }
}
