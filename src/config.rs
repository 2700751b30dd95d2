use crate::chain::DEFAULT_MAX_DEPTH;
use crate::drivers::DriverKind;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROOT: &str = "/var/lib/docker";
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Where container metadata comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectMode {
    /// Ask the Docker CLI found at the given path
    Docker { binary: String },
    /// No external calls; containers are named after their identifier
    Offline,
}

/// Settings for one scan of a storage root
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub driver: DriverKind,
    pub inspect: InspectMode,
    pub inspect_timeout: Duration,
    /// Upper bound for measuring one diff folder; `None` waits indefinitely
    pub size_timeout: Option<Duration>,
    pub max_chain_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            driver: DriverKind::Aufs,
            inspect: InspectMode::Docker {
                binary: DEFAULT_DOCKER_BINARY.to_string(),
            },
            inspect_timeout: Duration::from_secs(10),
            size_timeout: Some(Duration::from_secs(60)),
            max_chain_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
