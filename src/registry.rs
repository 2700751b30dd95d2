//! Deduplicating store of layers seen during a scan.
//!
//! [`LayerRegistry`] owns every [`LayerNode`] and hands out [`LayerId`] handles.
//! Two containers that reach the same digest get the same handle, so the
//! reference count and container list on that node are shared between them.
//!
//! The registry is owned by a single scan and mutated through `&mut self`;
//! lookup-or-insert is therefore one step and never yields duplicate nodes.

use crate::digest::normalize_digest;
use crate::error::Result;
use log::trace;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Handle to a node in a [`LayerRegistry`]. Equal handles mean the same node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

/// Recorded size of a layer. `Unknown` is kept apart from a real zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LayerSize {
    Known(u64),
    #[default]
    Unknown,
}

impl LayerSize {
    pub fn bytes(self) -> Option<u64> {
        match self {
            LayerSize::Known(bytes) => Some(bytes),
            LayerSize::Unknown => None,
        }
    }
}

impl fmt::Display for LayerSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSize::Known(bytes) => {
                write!(f, "{} ({} bytes)", indicatif::HumanBytes(*bytes), bytes)
            }
            LayerSize::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for LayerSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LayerSize::Known(bytes) => serializer.serialize_some(bytes),
            LayerSize::Unknown => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerNode {
    /// Bare digest, algorithm prefix stripped
    pub digest: String,
    pub size: LayerSize,
    /// Name of the diff folder holding this layer (cache-id, or the digest itself)
    pub storage_id: String,
    pub location: PathBuf,
    /// Next layer towards the base image; `None` on the base layer
    pub parent: Option<LayerId>,
    pub reference_count: usize,
    /// Containers using this layer as their own top layer, in resolution order
    pub containers: Vec<String>,
    /// Set once size, location and parent have been read
    pub(crate) initialized: bool,
}

impl LayerNode {
    fn new(digest: String) -> Self {
        Self {
            storage_id: digest.clone(),
            digest,
            size: LayerSize::Unknown,
            location: PathBuf::new(),
            parent: None,
            reference_count: 0,
            containers: Vec::new(),
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    nodes: Vec<LayerNode>,
    by_digest: HashMap<String, LayerId>,
    journal: Option<Journal>,
}

/// Undo log of an open checkpoint: the node count when it was taken and the
/// first saved copy of every pre-existing node touched since.
#[derive(Debug, Clone, Default)]
struct Journal {
    len: usize,
    saved: HashMap<LayerId, LayerNode>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `digest` (with or without an algorithm prefix), creating the
    /// node on first sight. Every call bumps the reference count; `container`
    /// is appended to the node's container list when given.
    pub fn resolve(&mut self, digest: &str, container: Option<&str>) -> Result<LayerId> {
        let digest = normalize_digest(digest)?;
        let id = match self.by_digest.get(&digest) {
            Some(&id) => id,
            None => {
                let id = LayerId(self.nodes.len());
                trace!("Registering layer {}", digest);
                self.nodes.push(LayerNode::new(digest.clone()));
                self.by_digest.insert(digest, id);
                id
            }
        };

        self.record(id);
        let node = &mut self.nodes[id.0];
        node.reference_count += 1;
        if let Some(name) = container.filter(|name| !name.is_empty()) {
            node.containers.push(name.to_string());
        }
        Ok(id)
    }

    pub fn get(&self, digest: &str) -> Option<LayerId> {
        let digest = normalize_digest(digest).ok()?;
        self.by_digest.get(&digest).copied()
    }

    pub fn node(&self, id: LayerId) -> &LayerNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: LayerId) -> &mut LayerNode {
        self.record(id);
        &mut self.nodes[id.0]
    }

    /// Starts recording changes so they can be undone with [`rollback`].
    /// An already open checkpoint is replaced.
    ///
    /// [`rollback`]: LayerRegistry::rollback
    pub fn checkpoint(&mut self) {
        self.journal = Some(Journal {
            len: self.nodes.len(),
            saved: HashMap::new(),
        });
    }

    /// Keeps every change made since the last checkpoint.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Drops nodes created since the last checkpoint and restores the ones
    /// it touched. Without an open checkpoint this does nothing.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for node in self.nodes.drain(journal.len..) {
            self.by_digest.remove(&node.digest);
        }
        for (id, node) in journal.saved {
            self.nodes[id.0] = node;
        }
    }

    fn record(&mut self, id: LayerId) {
        if let Some(journal) = &mut self.journal {
            if id.0 < journal.len {
                journal
                    .saved
                    .entry(id)
                    .or_insert_with(|| self.nodes[id.0].clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.nodes.iter()
    }

    /// Walks from `head` to the base layer, `head` included.
    pub fn chain(&self, head: LayerId) -> Chain<'_> {
        Chain {
            registry: self,
            next: Some(head),
            remaining: self.nodes.len(),
        }
    }
}

/// Iterator over a parent chain. Stops after visiting as many nodes as the
/// registry holds, so a corrupted parent link cannot make it spin forever.
pub struct Chain<'a> {
    registry: &'a LayerRegistry,
    next: Option<LayerId>,
    remaining: usize,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a LayerNode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.registry.node(self.next?);
        self.remaining -= 1;
        self.next = node.parent;
        Some(node)
    }
}
