use super::{ContainerDetails, Inspector};
use crate::error::Result;

/// Inspector used when the container runtime is not reachable
pub struct OfflineInspector;

impl Inspector for OfflineInspector {
    fn name(&self) -> &str {
        "offline"
    }

    fn inspect(&self, identifier: &str) -> Result<ContainerDetails> {
        Ok(ContainerDetails::unnamed(identifier))
    }
}
