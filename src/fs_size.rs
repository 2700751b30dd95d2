//! Apparent size of a directory tree, as `du -sb` would report it.

use crate::error::{Result, ScanError};
use log::trace;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Sums the sizes of every entry under a directory.
///
/// Symlinks are counted as links and never followed. A file with several hard
/// links inside the tree is counted once. The walk gives up with
/// [`ScanError::Timeout`] once `timeout` has elapsed.
#[derive(Debug, Clone)]
pub struct FolderSizer {
    timeout: Option<Duration>,
}

impl FolderSizer {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn folder_size(&self, path: &Path) -> Result<u64> {
        let deadline = self.timeout.map(|t| (Instant::now() + t, t));
        let mut seen_inodes = HashSet::new();
        let mut total = 0u64;

        for entry in WalkDir::new(path).follow_links(false) {
            if let Some((deadline, after)) = deadline {
                if Instant::now() >= deadline {
                    return Err(ScanError::Timeout {
                        what: format!("measuring {}", path.display()),
                        after,
                    });
                }
            }

            let entry = entry.map_err(|e| walk_error(path, e))?;
            let metadata = entry.metadata().map_err(|e| walk_error(path, e))?;

            if is_repeated_hard_link(&metadata, &mut seen_inodes) {
                continue;
            }
            total += metadata.len();
        }

        trace!("{} occupies {} bytes", path.display(), total);
        Ok(total)
    }
}

/// Keeps the path on [`ScanError::Io`] only, so it is not printed twice
fn walk_error(root: &Path, e: walkdir::Error) -> ScanError {
    let at = e.path().unwrap_or(root).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop"));
    ScanError::io(at, source)
}

impl Default for FolderSizer {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(unix)]
fn is_repeated_hard_link(metadata: &std::fs::Metadata, seen: &mut HashSet<(u64, u64)>) -> bool {
    use std::os::unix::fs::MetadataExt;

    if metadata.is_dir() || metadata.nlink() < 2 {
        return false;
    }
    !seen.insert((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn is_repeated_hard_link(_metadata: &std::fs::Metadata, _seen: &mut HashSet<(u64, u64)>) -> bool {
    false
}
