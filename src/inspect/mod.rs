//! Runtime metadata for containers (name, status, pid, start time).
//!
//! The layer scan only needs a display name; the rest is carried through to
//! the report. [`DockerInspector`] asks the Docker CLI, [`OfflineInspector`]
//! makes no external call and names containers after their identifier.

mod docker;
mod offline;

pub use docker::DockerInspector;
pub use offline::OfflineInspector;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerDetails {
    pub name: String,
    pub status: String,
    pub pid: i64,
    pub restart_count: u64,
    /// `None` when the container never started
    pub started_at: Option<DateTime<Utc>>,
}

impl ContainerDetails {
    /// Details for a container known only by its identifier
    pub fn unnamed(identifier: &str) -> Self {
        Self {
            name: identifier.to_string(),
            status: "unknown".to_string(),
            pid: 0,
            restart_count: 0,
            started_at: None,
        }
    }
}

/// Source of container metadata
pub trait Inspector {
    /// Returns the name of the inspector for log messages
    fn name(&self) -> &str;

    /// Looks up a single container. Fails with [`crate::ScanError::NotFound`]
    /// when the runtime has no record of it.
    fn inspect(&self, identifier: &str) -> Result<ContainerDetails>;
}
