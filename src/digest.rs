//! Reading identifier records from the storage root.
//!
//! Docker stores layer references as small text files holding either a bare
//! digest (`abc123`) or an algorithm-qualified one (`sha256:abc123`). Everything
//! the rest of the crate keys on is the bare form.

use crate::error::{Result, ScanError};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Strips an optional `"<algorithm>:"` prefix and returns the bare digest.
///
/// More than one separator, an empty half, or anything that could escape the
/// storage root once substituted into a path template is rejected.
pub fn normalize_digest(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = match trimmed.split_once(':') {
        None => trimmed,
        Some((algorithm, hex)) => {
            if algorithm.is_empty() || hex.contains(':') {
                return Err(ScanError::malformed(trimmed));
            }
            hex
        }
    };
    validate_component(bare, trimmed)?;
    Ok(bare.to_string())
}

/// Parses the content of a parent-pointer record, which must be `"<algorithm>:<hex>"`.
pub fn parse_parent_pointer(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.matches(':').count() != 1 {
        return Err(ScanError::malformed(trimmed));
    }
    normalize_digest(trimmed)
}

/// Reads a single-line identifier record (mount-id, init-id, cache-id).
pub fn read_identifier(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
    normalize_digest(&contents)
}

/// Reads a record whose absence is meaningful. `Ok(None)` means the file does not exist.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ScanError::io(path, e)),
    }
}

fn validate_component(component: &str, original: &str) -> Result<()> {
    let bad = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.chars().any(char::is_whitespace);
    if bad {
        return Err(ScanError::malformed(original));
    }
    Ok(())
}
