use crate::chain::ChainBuilder;
use crate::digest::{parse_parent_pointer, read_identifier, read_optional};
use crate::drivers::StorageDriver;
use crate::error::{Result, ScanError};
use crate::fs_size::FolderSizer;
use crate::inspect::{ContainerDetails, Inspector};
use crate::registry::{LayerId, LayerNode, LayerRegistry, LayerSize};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything known about one container after a successful build.
/// Records are never partially filled: a failing step discards the container.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    pub identifier: String,
    pub details: ContainerDetails,
    /// Writable diff folder of the container
    pub mount_id: String,
    pub mount_location: PathBuf,
    /// `Unknown` when the device backing the diff is not mounted
    pub mount_size: LayerSize,
    /// Init diff folder (hostname, resolv.conf and friends)
    pub init_id: String,
    pub init_location: PathBuf,
    pub init_size: LayerSize,
    /// Top of the shared image layers; `None` for containers without image layers
    pub parent_chain_head: Option<LayerId>,
}

impl ContainerRecord {
    pub fn name(&self) -> &str {
        &self.details.name
    }

    /// Image layers below the container, top first
    pub fn layers<'r>(&self, registry: &'r LayerRegistry) -> impl Iterator<Item = &'r LayerNode> {
        self.parent_chain_head
            .into_iter()
            .flat_map(move |head| registry.chain(head))
    }

    pub fn layer_count(&self, registry: &LayerRegistry) -> usize {
        self.layers(registry).count()
    }
}

pub struct ContainerBuilder<'a> {
    root: &'a Path,
    driver: &'a dyn StorageDriver,
    inspector: &'a dyn Inspector,
    sizer: &'a FolderSizer,
    chain: ChainBuilder<'a>,
}

impl<'a> ContainerBuilder<'a> {
    pub fn new(
        root: &'a Path,
        driver: &'a dyn StorageDriver,
        inspector: &'a dyn Inspector,
        sizer: &'a FolderSizer,
        chain: ChainBuilder<'a>,
    ) -> Self {
        Self {
            root,
            driver,
            inspector,
            sizer,
            chain,
        }
    }

    /// Builds the record for `identifier`, resolving its layer chain into `registry`.
    ///
    /// On failure the registry is restored to its state before the call, so
    /// reference counts and container lists only ever reflect built containers.
    pub fn build(&self, identifier: &str, registry: &mut LayerRegistry) -> Result<ContainerRecord> {
        registry.checkpoint();
        match self.build_record(identifier, registry) {
            Ok(record) => {
                registry.commit();
                Ok(record)
            }
            Err(e) => {
                registry.rollback();
                Err(e)
            }
        }
    }

    fn diff_size(&self, location: &Path) -> Result<LayerSize> {
        if self.driver.mounts_on_demand() && !is_mounted(location)? {
            debug!("{} is not mounted, its size is unknown", location.display());
            return Ok(LayerSize::Unknown);
        }
        self.sizer.folder_size(location).map(LayerSize::Known)
    }

    fn build_record(&self, identifier: &str, registry: &mut LayerRegistry) -> Result<ContainerRecord> {
        let details = self.inspector.inspect(identifier)?;
        debug!("Building container {} ({})", details.name, identifier);

        let mount_id =
            read_identifier(&self.driver.container_mount_id_path(self.root, identifier))?;
        let mount_location = self.driver.diff_path(self.root, &mount_id);
        let mount_size = self.diff_size(&mount_location)?;

        let init_id = read_identifier(&self.driver.container_init_id_path(self.root, identifier))?;
        let init_location = self.driver.diff_path(self.root, &init_id);
        let init_size = self.diff_size(&init_location)?;

        let parent_path = self.driver.container_parent_path(self.root, identifier);
        let parent_chain_head = match read_optional(&parent_path)? {
            Some(raw) => {
                let start = parse_parent_pointer(&raw)?;
                Some(
                    self.chain
                        .build_chain(registry, &start, Some(&details.name))?,
                )
            }
            None => {
                debug!("Container {} has no image layers", identifier);
                None
            }
        };

        Ok(ContainerRecord {
            identifier: identifier.to_string(),
            details,
            mount_id,
            mount_location,
            mount_size,
            init_id,
            init_location,
            init_size,
            parent_chain_head,
        })
    }
}

/// A mountpoint that is missing or empty has no device behind it
fn is_mounted(location: &Path) -> Result<bool> {
    match fs::read_dir(location) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ScanError::io(location, e)),
    }
}
