//! Storage driver path layouts.
//!
//! Every Docker storage driver keeps the same logical records (mount-id,
//! init-id, parent pointers, layer sizes, cache-ids) but in its own
//! directories. [`StorageDriver`] maps those logical records to concrete paths,
//! and [`DriverKind`] is the fixed set of layouts this build knows about.

pub mod aufs;
pub mod devicemapper;
pub mod overlay2;

use crate::error::ScanError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use aufs::AufsDriver;
pub use devicemapper::DeviceMapperDriver;
pub use overlay2::Overlay2Driver;

/// Path resolution for one storage driver layout. Implementations are pure:
/// they build paths, they never touch the filesystem.
pub trait StorageDriver {
    /// Returns the name of the driver as passed on the command line
    fn name(&self) -> &str;

    /// Directory holding one entry per container (the layerdb mounts directory)
    fn containers_dir(&self, root: &Path) -> PathBuf {
        layerdb(root, self.name()).join("mounts")
    }

    fn container_mount_id_path(&self, root: &Path, container: &str) -> PathBuf {
        self.containers_dir(root).join(container).join("mount-id")
    }

    fn container_init_id_path(&self, root: &Path, container: &str) -> PathBuf {
        self.containers_dir(root).join(container).join("init-id")
    }

    fn container_parent_path(&self, root: &Path, container: &str) -> PathBuf {
        self.containers_dir(root).join(container).join("parent")
    }

    fn layer_size_path(&self, root: &Path, digest: &str) -> PathBuf {
        layerdb(root, self.name()).join("sha256").join(digest).join("size")
    }

    fn layer_parent_path(&self, root: &Path, digest: &str) -> PathBuf {
        layerdb(root, self.name()).join("sha256").join(digest).join("parent")
    }

    /// Record naming the diff folder of a layer. `None` when the driver stores
    /// layer content under the digest itself.
    fn layer_cache_id_path(&self, _root: &Path, _digest: &str) -> Option<PathBuf> {
        None
    }

    /// Directory holding the diff content for a storage identifier
    fn diff_path(&self, root: &Path, id: &str) -> PathBuf;

    /// Directory listed to build the on-disk diff inventory
    fn diffs_dir(&self, root: &Path) -> PathBuf;

    /// True when diff folders are mountpoints that only show content while the
    /// device is mounted. An absent or empty folder then means unmounted, and
    /// its size is unknown rather than an error.
    fn mounts_on_demand(&self) -> bool {
        false
    }

    /// Drops entries of the diff directory that are driver bookkeeping rather than diffs
    fn filter_diff_folders(&self, folders: Vec<String>) -> Vec<String> {
        folders.into_iter().filter(|f| !is_hidden(f)).collect()
    }
}

/// `<root>/image/<driver>/layerdb`
pub fn layerdb(root: &Path, driver: &str) -> PathBuf {
    root.join("image").join(driver).join("layerdb")
}

pub(crate) fn is_hidden(name: &str) -> bool {
    name.is_empty() || name.starts_with('.')
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriverKind {
    Aufs,
    Overlay2,
    DeviceMapper,
}

impl DriverKind {
    pub const ALL: [DriverKind; 3] = [
        DriverKind::Aufs,
        DriverKind::Overlay2,
        DriverKind::DeviceMapper,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DriverKind::Aufs => "aufs",
            DriverKind::Overlay2 => "overlay2",
            DriverKind::DeviceMapper => "devicemapper",
        }
    }

    pub fn resolver(self) -> Box<dyn StorageDriver> {
        match self {
            DriverKind::Aufs => Box::new(AufsDriver),
            DriverKind::Overlay2 => Box::new(Overlay2Driver),
            DriverKind::DeviceMapper => Box::new(DeviceMapperDriver),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = ScanError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        DriverKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| ScanError::UnsupportedDriver {
                name: name.to_string(),
                supported: DriverKind::ALL.map(DriverKind::as_str).join(", "),
            })
    }
}
