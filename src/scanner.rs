//! One pass over a Docker storage root.
//!
//! [`Scanner`] ties the pieces together:
//! 1. lists the container directory of the configured driver (fatal on failure),
//! 2. builds a [`ContainerRecord`] per container, skipping the ones that fail,
//! 3. lists the on-disk diff folders (fatal on failure),
//! 4. reports the diff folders no built container reaches.
//!
//! The layer registry lives for the duration of [`Scanner::scan`] and is
//! returned inside the [`ScanReport`].

use crate::chain::ChainBuilder;
use crate::config::{InspectMode, ScanConfig};
use crate::container::{ContainerBuilder, ContainerRecord};
use crate::drivers::{is_hidden, DriverKind, StorageDriver};
use crate::error::{Result, ScanError};
use crate::fs_size::FolderSizer;
use crate::inspect::{DockerInspector, Inspector, OfflineInspector};
use crate::notifier::Notifier;
use crate::orphans::{disk_inventory, find_orphans};
use crate::registry::LayerRegistry;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

/// A container that could not be built, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedContainer {
    pub identifier: String,
    pub reason: String,
}

/// Result of a scan
#[derive(Debug)]
pub struct ScanReport {
    pub driver: DriverKind,
    pub root: PathBuf,
    pub containers: Vec<ContainerRecord>,
    pub skipped: Vec<SkippedContainer>,
    pub registry: LayerRegistry,
    pub orphans: BTreeSet<String>,
}

impl ScanReport {
    /// True when every enumerated container made it into the report
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn container(&self, name: &str) -> Option<&ContainerRecord> {
        self.containers.iter().find(|c| c.name() == name)
    }
}

pub struct Scanner {
    config: ScanConfig,
    driver: Box<dyn StorageDriver>,
    inspector: Box<dyn Inspector>,
    notifier: Notifier,
}

impl Scanner {
    pub fn new(config: ScanConfig, inspector: Box<dyn Inspector>, notifier: Notifier) -> Self {
        let driver = config.driver.resolver();
        Self {
            config,
            driver,
            inspector,
            notifier,
        }
    }

    /// Builds a scanner whose inspector follows `config.inspect`
    pub fn from_config(config: ScanConfig, notifier: Notifier) -> Self {
        let inspector: Box<dyn Inspector> = match &config.inspect {
            InspectMode::Docker { binary } => {
                Box::new(DockerInspector::new(binary.clone(), config.inspect_timeout))
            }
            InspectMode::Offline => Box::new(OfflineInspector),
        };
        Self::new(config, inspector, notifier)
    }

    /// Identifiers of every container known to the driver, sorted
    pub fn list_containers(&self) -> Result<Vec<String>> {
        let dir = self.driver.containers_dir(&self.config.root);
        let entries = fs::read_dir(&dir).map_err(|e| ScanError::io(&dir, e))?;

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ScanError::io(&dir, e))?;
            match entry.file_name().into_string() {
                Ok(name) if is_hidden(&name) => {}
                Ok(name) => containers.push(name),
                Err(name) => warn!(
                    "Ignoring container entry with a non UTF-8 name: {}",
                    name.to_string_lossy()
                ),
            }
        }
        containers.sort();
        Ok(containers)
    }

    pub fn scan(&self) -> Result<ScanReport> {
        info!(
            "Scanning {} with the {} driver ({} inspector)",
            self.config.root.display(),
            self.driver.name(),
            self.inspector.name()
        );
        let identifiers = self.list_containers()?;

        let sizer = FolderSizer::new(self.config.size_timeout);
        let chain = ChainBuilder::new(&self.config.root, self.driver.as_ref())
            .with_max_depth(self.config.max_chain_depth);
        let builder = ContainerBuilder::new(
            &self.config.root,
            self.driver.as_ref(),
            self.inspector.as_ref(),
            &sizer,
            chain,
        );

        let mut registry = LayerRegistry::new();
        let mut containers = Vec::new();
        let mut skipped = Vec::new();

        let progress = self
            .notifier
            .start(identifiers.len() as u64, "Resolving containers");
        for (index, identifier) in identifiers.iter().enumerate() {
            progress.step(index as u64 + 1, identifier);
            match builder.build(identifier, &mut registry) {
                Ok(record) => containers.push(record),
                Err(e) => {
                    progress.warn(&format!("Skipping container {}: {}", identifier, e));
                    skipped.push(SkippedContainer {
                        identifier: identifier.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        progress.finish();

        let inventory = disk_inventory(&self.config.root, self.driver.as_ref())?;
        let orphans = find_orphans(&containers, &registry, &inventory);
        debug!(
            "{} containers, {} layers, {} orphaned diffs",
            containers.len(),
            registry.len(),
            orphans.len()
        );

        Ok(ScanReport {
            driver: self.config.driver,
            root: self.config.root.clone(),
            containers,
            skipped,
            registry,
            orphans,
        })
    }
}
