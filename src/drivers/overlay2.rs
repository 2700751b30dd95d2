use std::path::{Path, PathBuf};

use super::{is_hidden, layerdb, StorageDriver};

/// Name of the directory of shortened symlinks overlay2 keeps next to the layer folders.
const LINK_DIR: &str = "l";

/// `overlay2`: each layer folder holds a `diff/` subdirectory with the content.
pub struct Overlay2Driver;

impl StorageDriver for Overlay2Driver {
    fn name(&self) -> &str {
        "overlay2"
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
        self.diffs_dir(root).join(id).join("diff")
    }

    fn diffs_dir(&self, root: &Path) -> PathBuf {
        root.join("overlay2")
    }

    fn filter_diff_folders(&self, folders: Vec<String>) -> Vec<String> {
        folders
            .into_iter()
            .filter(|f| !is_hidden(f) && f != LINK_DIR)
            .collect()
    }
}
