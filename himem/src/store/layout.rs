//! On-disk payload layout.
//!
//! ```text
//! <root>/tiles/<stream>/<snapshot_id>/L<level>/x<x>/y<y>/<tile_id[..12]>.bin
//! ```
//!
//! Stream names and snapshot ids become directory names, so both are
//! checked with [`validate_identifier`] before anything touches disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{StoreError, StoreResult};

/// Hex characters of the tile id used in the file name.
pub const FILE_ID_PREFIX: usize = 12;

/// Longest identifier accepted as a path component.
pub const MAX_IDENTIFIER_BYTES: usize = 255;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Reject identifiers that cannot be used as a single path component.
pub fn validate_identifier(kind: &'static str, value: &str) -> StoreResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative path component")
    } else if value.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if value.contains('\0') {
        Some("must not contain NUL")
    } else if value.len() > MAX_IDENTIFIER_BYTES {
        Some("must be at most 255 bytes")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Where a tile's payload lives under `tiles_dir`.
pub fn payload_path(
    tiles_dir: &Path,
    stream: &str,
    snapshot_id: &str,
    level: u32,
    x: u32,
    y: u32,
    tile_id: &str,
) -> PathBuf {
    let prefix = tile_id.get(..FILE_ID_PREFIX).unwrap_or(tile_id);
    tiles_dir
        .join(stream)
        .join(snapshot_id)
        .join(format!("L{}", level))
        .join(format!("x{}", x))
        .join(format!("y{}", y))
        .join(format!("{}.bin", prefix))
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
///
/// Readers never observe a partially written payload.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let nonce = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), nonce));

    let result = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}
