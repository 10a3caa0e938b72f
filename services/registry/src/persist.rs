//! Periodic snapshotting of the store to a JSON file, so a restarted
//! registry recovers every value that was present when it last saved
//! (service descriptors included — they are ordinary stored values).

use crate::store::Store;
use mesh_core::ValueMeta;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistFile {
    version: u32,
    values: Vec<ValueMeta>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("writing snapshot '{0}': {1}")]
    Write(String, std::io::Error),
    #[error("reading snapshot '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("encoding snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("snapshot '{path}' has unsupported version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { path: String, found: u32 },
}

/// Write every entry in `store`, sorted ascending by key, to `path`. Writes
/// land directly atop the target file: no temp-file-and-rename, so a crash
/// mid-write can leave a torn snapshot. Snapshotting runs on the event loop,
/// which is the only writer, so there is no concurrent-writer risk to guard
/// against — only the crash-mid-write case, which the registry accepts.
pub fn save_snapshot(store: &Store, path: &Path) -> Result<(), PersistError> {
    let file = PersistFile {
        version: SNAPSHOT_VERSION,
        values: store.sorted_values().into_iter().cloned().collect(),
    };
    let json = serde_json::to_vec_pretty(&file)?;
    std::fs::write(path, &json).map_err(|e| PersistError::Write(path.display().to_string(), e))
}

/// Load a snapshot from `path`. A missing file is not an error — it
/// signals a first run — and yields an empty list.
pub fn load_snapshot(path: &Path) -> Result<Vec<ValueMeta>, PersistError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistError::Read(path.display().to_string(), e)),
    };

    let file: PersistFile = serde_json::from_slice(&bytes)?;
    if file.version != SNAPSHOT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            path: path.display().to_string(),
            found: file.version,
        });
    }
    Ok(file.values)
}
