//! The write-side duplicate guard.
//!
//! Sole de-duplication strategy: date + filename heuristics against the
//! in-memory [`StoreIndex`], no content hashing. Never overwrites with
//! same-or-older data, never duplicates an exact dated file.

use std::fs;
use std::path::Path;

use crate::error::{GrabError, Result};

use super::checkpoint::StoreIndex;
use super::filter::AttachmentTarget;

/// What happened to one attachment candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The payload was written to the target path.
    Written,
    /// An equal-or-newer-dated file already exists in the target
    /// directory; the candidate was suppressed.
    Superseded,
    /// The exact target path is already occupied (already downloaded).
    AlreadyPresent,
}

/// Store one attachment payload, consulting and updating the index.
///
/// Steps: superseded check, idempotent directory creation, exact-path
/// check (index first, filesystem as a belt check for files the index
/// has not seen), write, index update. Errors carry the target path;
/// the caller logs them and moves on to the next attachment.
pub fn store_attachment(
    index: &mut StoreIndex,
    out_root: &Path,
    target: &AttachmentTarget,
    payload: &[u8],
) -> Result<StoreOutcome> {
    if index.is_superseded(&target.extension, target.date) {
        return Ok(StoreOutcome::Superseded);
    }

    let dir = out_root.join(&target.dir);
    fs::create_dir_all(&dir).map_err(|e| GrabError::io(&dir, e))?;

    let path = dir.join(&target.filename);
    if index.contains(&target.extension, &target.filename) || path.is_file() {
        return Ok(StoreOutcome::AlreadyPresent);
    }

    fs::write(&path, payload).map_err(|e| GrabError::WriteFailed {
        path: path.clone(),
        source: e,
    })?;
    index.record(&target.extension, &target.filename, target.date);
    Ok(StoreOutcome::Written)
}
