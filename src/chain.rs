//! Resolution of a layer's parent chain.
//!
//! Starting from one digest, [`ChainBuilder`] reads each layer's size,
//! diff location and parent pointer, registering every layer in the
//! [`LayerRegistry`]. A layer already initialized by an earlier walk ends
//! the walk, since everything below it is known.

use crate::digest::{parse_parent_pointer, read_identifier, read_optional};
use crate::drivers::StorageDriver;
use crate::error::{Result, ScanError};
use crate::registry::{LayerId, LayerRegistry, LayerSize};
use log::{debug, warn};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_MAX_DEPTH: usize = 512;

pub struct ChainBuilder<'a> {
    root: &'a Path,
    driver: &'a dyn StorageDriver,
    max_depth: usize,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(root: &'a Path, driver: &'a dyn StorageDriver) -> Self {
        Self {
            root,
            driver,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Longest chain accepted, counted in layers from the start digest to the
    /// base, including layers already resolved by earlier walks.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolves `start` and all of its ancestors, returning the head of the chain.
    ///
    /// `container` is recorded on the head node only; ancestors are shared
    /// anonymously. Fails on an unreadable cache-id or parent record, a
    /// malformed parent pointer, a loop in the chain, or a chain longer than
    /// the configured depth. Nodes touched before the failure stay in the
    /// registry; callers that need all-or-nothing semantics take a
    /// [`LayerRegistry::checkpoint`] first.
    pub fn build_chain(
        &self,
        registry: &mut LayerRegistry,
        start: &str,
        container: Option<&str>,
    ) -> Result<LayerId> {
        let head = registry.resolve(start, container)?;
        let mut visited = HashSet::from([head]);
        let mut current = head;

        while !registry.node(current).is_initialized() {
            if visited.len() > self.max_depth {
                return Err(self.too_deep());
            }

            let parent = self.init_layer(registry, current)?;
            match parent {
                None => break,
                Some(parent) => {
                    if !visited.insert(parent) {
                        return Err(ScanError::CyclicChain {
                            digest: registry.node(parent).digest.clone(),
                        });
                    }
                    current = parent;
                }
            }
        }

        // Joined a chain resolved by an earlier walk: its layers count too
        if registry.node(current).is_initialized() {
            let depth = visited.len() - 1 + registry.chain(current).count();
            if depth > self.max_depth {
                return Err(self.too_deep());
            }
        }

        Ok(head)
    }

    fn too_deep(&self) -> ScanError {
        ScanError::ChainTooDeep {
            limit: self.max_depth,
        }
    }

    /// Reads the records of one layer and links it to its parent, if any.
    fn init_layer(&self, registry: &mut LayerRegistry, id: LayerId) -> Result<Option<LayerId>> {
        let digest = registry.node(id).digest.clone();

        let size = self.read_size(&digest);
        let storage_id = match self.driver.layer_cache_id_path(self.root, &digest) {
            Some(path) => read_identifier(&path)?,
            None => digest.clone(),
        };
        let location = self.driver.diff_path(self.root, &storage_id);

        // No parent record means this is the base layer
        let parent_path = self.driver.layer_parent_path(self.root, &digest);
        let parent = match read_optional(&parent_path)? {
            Some(raw) => {
                let parent_digest = parse_parent_pointer(&raw)?;
                Some(registry.resolve(&parent_digest, None)?)
            }
            None => None,
        };

        debug!(
            "Layer {} -> {} (size {}, parent {})",
            digest,
            location.display(),
            size,
            parent
                .map(|p| registry.node(p).digest.as_str())
                .unwrap_or("none")
        );

        let node = registry.node_mut(id);
        node.size = size;
        node.storage_id = storage_id;
        node.location = location;
        node.parent = parent;
        node.initialized = true;
        Ok(parent)
    }

    /// Missing, empty or unparseable size records become [`LayerSize::Unknown`].
    fn read_size(&self, digest: &str) -> LayerSize {
        let path = self.driver.layer_size_path(self.root, digest);
        let raw = match read_optional(&path) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Layer {} has no size record", digest);
                return LayerSize::Unknown;
            }
            Err(e) => {
                warn!("Could not read size of layer {}: {}", digest, e);
                return LayerSize::Unknown;
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return LayerSize::Unknown;
        }
        match trimmed.parse::<u64>() {
            Ok(bytes) => LayerSize::Known(bytes),
            Err(_) => {
                warn!("Layer {} has an unreadable size record: {:?}", digest, trimmed);
                LayerSize::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{layerdb, Overlay2Driver};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    fn layer_dir(root: &Path, digest: &str) -> PathBuf {
        let dir = layerdb(root, "overlay2").join("sha256").join(digest);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes a layerdb entry whose cache-id is `<digest>-cache`
    fn write_layer(root: &Path, digest: &str, size: Option<&str>, parent: Option<&str>) {
        let dir = layer_dir(root, digest);
        fs::write(dir.join("cache-id"), format!("{digest}-cache")).unwrap();
        if let Some(size) = size {
            fs::write(dir.join("size"), size).unwrap();
        }
        if let Some(parent) = parent {
            fs::write(dir.join("parent"), parent).unwrap();
        }
    }

    fn storage() -> TempDir {
        tempdir().unwrap()
    }

    #[test]
    fn test_base_layer_ends_chain() {
        let dir = storage();
        write_layer(dir.path(), "base", Some("1024"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let head = builder.build_chain(&mut registry, "sha256:base", None).unwrap();

        let chain: Vec<_> = registry.chain(head).collect();
        assert_eq!(chain.len(), 1);
        let node = chain[0];
        assert!(node.parent.is_none());
        assert_eq!(node.size, LayerSize::Known(1024));
        assert_eq!(node.storage_id, "base-cache");
        assert_eq!(node.location, dir.path().join("overlay2/base-cache/diff"));
    }

    #[test]
    fn test_walks_parents_to_base() {
        let dir = storage();
        write_layer(dir.path(), "top", Some("10"), Some("sha256:mid"));
        write_layer(dir.path(), "mid", Some("20"), Some("sha256:base"));
        write_layer(dir.path(), "base", Some("30"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let head = builder.build_chain(&mut registry, "top", Some("web")).unwrap();

        let digests: Vec<_> = registry.chain(head).map(|n| n.digest.clone()).collect();
        assert_eq!(digests, vec!["top", "mid", "base"]);
        assert_eq!(registry.node(head).containers, vec!["web"]);
        let base = registry.get("base").unwrap();
        assert!(registry.node(base).containers.is_empty());
    }

    #[test]
    fn test_shared_ancestor_counts_each_reference() {
        let dir = storage();
        write_layer(dir.path(), "web-top", Some("1"), Some("sha256:base123"));
        write_layer(dir.path(), "api-top", Some("1"), Some("sha256:base123"));
        write_layer(dir.path(), "base123", Some("100"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        builder.build_chain(&mut registry, "web-top", Some("web")).unwrap();
        builder.build_chain(&mut registry, "api-top", Some("api")).unwrap();

        let base = registry.node(registry.get("base123").unwrap());
        assert_eq!(base.reference_count, 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_empty_and_missing_sizes_are_unknown() {
        let dir = storage();
        write_layer(dir.path(), "l1", Some(""), Some("sha256:l2"));
        write_layer(dir.path(), "l2", None, Some("sha256:l3"));
        write_layer(dir.path(), "l3", Some("0"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let head = builder.build_chain(&mut registry, "l1", None).unwrap();

        let sizes: Vec<_> = registry.chain(head).map(|n| n.size).collect();
        assert_eq!(
            sizes,
            vec![LayerSize::Unknown, LayerSize::Unknown, LayerSize::Known(0)]
        );
    }

    #[test]
    fn test_malformed_parent_pointer_fails() {
        let dir = storage();
        write_layer(dir.path(), "top", Some("1"), Some("not-a-valid-format"));

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let err = builder.build_chain(&mut registry, "top", None).unwrap_err();

        assert!(matches!(err, ScanError::MalformedIdentifier { .. }));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("not-a-valid-format").is_none());
    }

    #[test]
    fn test_cycle_is_detected() {
        let dir = storage();
        write_layer(dir.path(), "a", Some("1"), Some("sha256:b"));
        write_layer(dir.path(), "b", Some("1"), Some("sha256:a"));

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let err = builder.build_chain(&mut registry, "a", None).unwrap_err();
        assert!(matches!(err, ScanError::CyclicChain { digest } if digest == "a"));
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let dir = storage();
        write_layer(dir.path(), "a", Some("1"), Some("sha256:a"));

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let err = builder.build_chain(&mut registry, "a", None).unwrap_err();
        assert!(matches!(err, ScanError::CyclicChain { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let dir = storage();
        write_layer(dir.path(), "l0", Some("1"), Some("sha256:l1"));
        write_layer(dir.path(), "l1", Some("1"), Some("sha256:l2"));
        write_layer(dir.path(), "l2", Some("1"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver).with_max_depth(2);
        let err = builder.build_chain(&mut registry, "l0", None).unwrap_err();
        assert!(matches!(err, ScanError::ChainTooDeep { limit: 2 }));
    }

    #[test]
    fn test_depth_limit_counts_resolved_ancestors() {
        let dir = storage();
        write_layer(dir.path(), "top", Some("1"), Some("sha256:l0"));
        write_layer(dir.path(), "l0", Some("1"), Some("sha256:l1"));
        write_layer(dir.path(), "l1", Some("1"), Some("sha256:l2"));
        write_layer(dir.path(), "l2", Some("1"), None);

        let mut registry = LayerRegistry::new();
        ChainBuilder::new(dir.path(), &Overlay2Driver)
            .build_chain(&mut registry, "l0", None)
            .unwrap();

        let shallow = ChainBuilder::new(dir.path(), &Overlay2Driver).with_max_depth(3);
        let err = shallow.build_chain(&mut registry, "top", None).unwrap_err();
        assert!(matches!(err, ScanError::ChainTooDeep { limit: 3 }));
        // a head resolved by the failed walk is still measured
        assert!(registry.node(registry.get("top").unwrap()).is_initialized());
        let err = shallow.build_chain(&mut registry, "top", None).unwrap_err();
        assert!(matches!(err, ScanError::ChainTooDeep { limit: 3 }));

        let exact = ChainBuilder::new(dir.path(), &Overlay2Driver).with_max_depth(4);
        let head = exact.build_chain(&mut registry, "top", None).unwrap();
        assert_eq!(registry.chain(head).count(), 4);
    }

    #[test]
    fn test_missing_cache_id_is_io_error() {
        let dir = storage();
        let layer = layer_dir(dir.path(), "top");
        fs::write(layer.join("size"), "5").unwrap();

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        let err = builder.build_chain(&mut registry, "top", None).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[test]
    fn test_initialized_layer_is_not_reread() {
        let dir = storage();
        write_layer(dir.path(), "base", Some("7"), None);

        let mut registry = LayerRegistry::new();
        let builder = ChainBuilder::new(dir.path(), &Overlay2Driver);
        builder.build_chain(&mut registry, "base", None).unwrap();

        // Records vanish after the first walk; the second walk must not need them
        fs::remove_dir_all(layer_dir(dir.path(), "base")).unwrap();
        let head = builder.build_chain(&mut registry, "base", Some("web")).unwrap();

        let node = registry.node(head);
        assert_eq!(node.size, LayerSize::Known(7));
        assert_eq!(node.reference_count, 2);
        assert_eq!(node.containers, vec!["web"]);
    }
}
