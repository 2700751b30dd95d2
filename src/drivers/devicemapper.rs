use std::path::{Path, PathBuf};

use super::{layerdb, StorageDriver};

/// `devicemapper`: thin devices are mounted under `devicemapper/mnt/<id>`.
/// Devices of stopped containers are usually unmounted, leaving the
/// mountpoint empty or missing.
pub struct DeviceMapperDriver;

impl StorageDriver for DeviceMapperDriver {
    fn name(&self) -> &str {
        "devicemapper"
    }

    fn layer_cache_id_path(&self, root: &Path, digest: &str) -> Option<PathBuf> {
        Some(
            layerdb(root, self.name())
                .join("sha256")
                .join(digest)
                .join("cache-id"),
        )
    }

    fn diff_path(&self, root: &Path, id: &str) -> PathBuf {
        self.diffs_dir(root).join(id)
    }

    fn diffs_dir(&self, root: &Path) -> PathBuf {
        root.join("devicemapper").join("mnt")
    }

    fn mounts_on_demand(&self) -> bool {
        true
    }
}
