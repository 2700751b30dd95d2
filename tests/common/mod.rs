//! Shared helpers: an on-disk storage root laid out by a real driver, and a
//! scripted inspector.

use layerscope::{ContainerDetails, DriverKind, Inspector, ScanError, StorageDriver};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Temporary Docker storage root populated through the driver's own path layout
pub struct StorageFixture {
    dir: TempDir,
    driver: Box<dyn StorageDriver>,
}

#[allow(dead_code)]
impl StorageFixture {
    pub fn new(kind: DriverKind) -> Self {
        let dir = TempDir::new().unwrap();
        let driver = kind.resolver();
        fs::create_dir_all(driver.containers_dir(dir.path())).unwrap();
        fs::create_dir_all(driver.diffs_dir(dir.path())).unwrap();
        Self { dir, driver }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Adds a layerdb entry for `digest` whose diff folder is `<digest>-cache`
    pub fn add_layer(&self, digest: &str, size: Option<&str>, parent: Option<&str>) {
        let root = self.root();
        let size_path = self.driver.layer_size_path(root, digest);
        fs::create_dir_all(size_path.parent().unwrap()).unwrap();
        if let Some(size) = size {
            fs::write(&size_path, size).unwrap();
        }
        if let Some(parent) = parent {
            fs::write(self.driver.layer_parent_path(root, digest), parent).unwrap();
        }
        let cache_id = format!("{digest}-cache");
        if let Some(path) = self.driver.layer_cache_id_path(root, digest) {
            fs::write(path, &cache_id).unwrap();
        }
        self.add_diff_folder(&cache_id);
    }

    /// Adds a container with mount id `<id>-rw` and init id `<id>-rw-init`
    pub fn add_container(&self, id: &str, parent: Option<&str>) {
        let root = self.root();
        let mount_id_path = self.driver.container_mount_id_path(root, id);
        fs::create_dir_all(mount_id_path.parent().unwrap()).unwrap();
        fs::write(&mount_id_path, format!("{id}-rw")).unwrap();
        fs::write(
            self.driver.container_init_id_path(root, id),
            format!("{id}-rw-init"),
        )
        .unwrap();
        if let Some(parent) = parent {
            fs::write(self.driver.container_parent_path(root, id), parent).unwrap();
        }

        self.add_diff_folder(&format!("{id}-rw"));
        self.add_diff_folder(&format!("{id}-rw-init"));
        fs::write(
            self.driver.diff_path(root, &format!("{id}-rw")).join("written"),
            vec![1u8; 256],
        )
        .unwrap();
    }

    pub fn add_diff_folder(&self, id: &str) {
        fs::create_dir_all(self.driver.diff_path(self.root(), id)).unwrap();
    }
}

/// Inspector answering from a fixed identifier → name table
pub struct MockInspector {
    names: HashMap<String, String>,
}

#[allow(dead_code)]
impl MockInspector {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl Inspector for MockInspector {
    fn name(&self) -> &str {
        "mock"
    }

    fn inspect(&self, identifier: &str) -> Result<ContainerDetails, ScanError> {
        let name = self
            .names
            .get(identifier)
            .ok_or_else(|| ScanError::NotFound {
                container: identifier.to_string(),
            })?;
        Ok(ContainerDetails {
            name: name.clone(),
            status: "running".to_string(),
            pid: 1000,
            restart_count: 0,
            started_at: None,
        })
    }
}
