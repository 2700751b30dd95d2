use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised while resolving containers and their layer chains.
///
/// A missing or empty size record is deliberately absent from this list:
/// it is carried as [`crate::registry::LayerSize::Unknown`] instead.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no container matching '{container}' was reported by the inspector")]
    NotFound { container: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed identifier: '{value}'")]
    MalformedIdentifier { value: String },

    #[error("unsupported storage driver '{name}' (supported: {supported})")]
    UnsupportedDriver { name: String, supported: String },

    #[error("layer chain loops back to {digest}")]
    CyclicChain { digest: String },

    #[error("layer chain is longer than {limit} layers")]
    ChainTooDeep { limit: usize },

    #[error("inspecting container '{container}' failed: {reason}")]
    Inspect { container: String, reason: String },

    #[error("{what} did not finish within {after:?}")]
    Timeout { what: String, after: Duration },
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(value: impl Into<String>) -> Self {
        ScanError::MalformedIdentifier {
            value: value.into(),
        }
    }
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
