//! Detection of diff folders that no known container uses.

use crate::container::ContainerRecord;
use crate::drivers::StorageDriver;
use crate::error::{Result, ScanError};
use crate::registry::LayerRegistry;
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// Lists the diff folders present on disk, with driver bookkeeping entries removed.
pub fn disk_inventory(root: &Path, driver: &dyn StorageDriver) -> Result<Vec<String>> {
    let dir = driver.diffs_dir(root);
    let entries = fs::read_dir(&dir).map_err(|e| ScanError::io(&dir, e))?;

    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::io(&dir, e))?;
        match entry.file_name().into_string() {
            Ok(name) => folders.push(name),
            Err(name) => warn!("Ignoring non UTF-8 entry {:?} in {}", name, dir.display()),
        }
    }
    folders.sort();

    let folders = driver.filter_diff_folders(folders);
    debug!("Found {} diff folders in {}", folders.len(), dir.display());
    Ok(folders)
}

/// Storage identifiers used by the given containers: their mount and init
/// folders plus the diff folder of every layer in their chains.
pub fn reachable_set(containers: &[ContainerRecord], registry: &LayerRegistry) -> HashSet<String> {
    let mut reachable = HashSet::new();
    for container in containers {
        reachable.insert(container.mount_id.clone());
        reachable.insert(container.init_id.clone());
        for layer in container.layers(registry) {
            reachable.insert(layer.storage_id.clone());
        }
    }
    reachable
}

/// Returns the inventory entries no container can reach, sorted.
pub fn find_orphans(
    containers: &[ContainerRecord],
    registry: &LayerRegistry,
    inventory: &[String],
) -> BTreeSet<String> {
    let reachable = reachable_set(containers, registry);
    inventory
        .iter()
        .filter(|folder| !reachable.contains(folder.as_str()))
        .cloned()
        .collect()
}
