// Snapshot of a task record held by the remote service.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remote task as fetched during a pass.
///
/// Never persisted: the cache drops every snapshot when the pass ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    /// Service-assigned id, the token captured from links in documents.
    pub id: String,
    /// Human readable label such as `TASK-12`, if the service exposes one.
    pub label: Option<String>,
    pub title: String,
    /// Status name exactly as the service reports it.
    pub status: String,
    pub last_edited: DateTime<Utc>,
    pub url: String,
    /// Parent or project reference (an id on the remote side).
    pub project: Option<String>,
}

impl RemoteTask {
    /// Label used in notifications; falls back to the raw id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// A database (task board) visible to the configured credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDatabase {
    pub id: String,
    pub title: String,
}

/// An open task enriched for link insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTodo {
    pub task: RemoteTask,
    /// Resolved project name, empty when the task has no project.
    pub project_name: String,
}
