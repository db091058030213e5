//! Domain primitive types used across the Labvisor workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a persisted lab, assigned by the lab store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabId(u64);

impl LabId {
    /// Creates a lab ID from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a task in the external task catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a task ID from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-side name of a lab container: `lab_{task}_{timestamp}`.
///
/// The name is the join key between a lab record and the live container,
/// so it is generated once and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerName(String);

impl ContainerName {
    /// Wraps an existing container name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the container name for a lab of `task` created at `at`.
    #[must_use]
    pub fn for_task(task: TaskId, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}{task}_{}",
            crate::constants::CONTAINER_NAME_PREFIX,
            at.format(crate::constants::CONTAINER_TIMESTAMP_FORMAT)
        ))
    }

    /// Image reference prefix shared by every snapshot of this container.
    #[must_use]
    pub fn snapshot_prefix(&self) -> String {
        format!("{}{}", self.0, crate::constants::SNAPSHOT_INFIX)
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no container has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a lab as recorded in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    /// The record exists but no container has been launched for it.
    #[default]
    Pending,
    /// The container was launched or started.
    Running,
    /// The container was stopped and can be started again.
    Stopped,
}

impl LabStatus {
    /// Returns `true` if a container is attached in this state.
    #[must_use]
    pub const fn has_container(self) -> bool {
        matches!(self, Self::Running | Self::Stopped)
    }
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// A persisted lab and its associated container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    /// Store-assigned identifier.
    pub id: LabId,
    /// Owning task in the external catalog.
    pub task_id: TaskId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Engine-assigned container identifier; empty until launched.
    #[serde(default)]
    pub container_id: String,
    /// Engine-side container name; empty until launched.
    #[serde(default = "empty_name")]
    pub container_name: ContainerName,
    /// Externally reachable address of the container's service.
    #[serde(default)]
    pub access_url: String,
    /// Image the container was launched from, or the latest written-back snapshot.
    #[serde(default)]
    pub commit_image: String,
    /// Recorded lifecycle state.
    #[serde(default)]
    pub status: LabStatus,
    /// Creation time, set by the store.
    pub created_at: DateTime<Utc>,
    /// Last modification time, set by the store.
    pub updated_at: DateTime<Utc>,
}

fn empty_name() -> ContainerName {
    ContainerName::new(String::new())
}

impl Lab {
    /// Returns `true` if the lab has an engine-side container.
    #[must_use]
    pub fn has_container(&self) -> bool {
        !self.container_name.is_empty()
    }
}

/// Fields of a lab that the caller supplies on creation.
///
/// The store assigns the identifier and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLab {
    /// Owning task in the external catalog.
    pub task_id: TaskId,
    /// Display title.
    pub title: String,
    /// Engine-assigned container identifier.
    pub container_id: String,
    /// Engine-side container name.
    pub container_name: ContainerName,
    /// Externally reachable address of the container's service.
    pub access_url: String,
    /// Image the container was launched from.
    pub commit_image: String,
    /// Initial lifecycle state.
    pub status: LabStatus,
}
