use std::path::{Path, PathBuf};

use super::{layerdb, StorageDriver};

/// `aufs`: diffs live flat under `aufs/diff/<id>`.
pub struct AufsDriver;

impl StorageDriver for AufsDriver {
    fn name(&self) -> &str {
        "aufs"
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
        root.join("aufs").join("diff")
    }
}
