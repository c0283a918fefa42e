use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::snapshot::{self, TaskSnapshot};

/// Companion surfaces (widgets, lock screens, watches) implement this to
/// receive the flattened task list after every change.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshots: &[TaskSnapshot]);
}

pub fn write_snapshots(path: impl AsRef<Path>, snapshots: &[TaskSnapshot]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let payload = snapshot::to_json(snapshots)?;
    fs::write(path, payload)
        .with_context(|| format!("unable to write snapshot file {}", path.display()))?;
    Ok(())
}

pub fn read_snapshots(path: impl AsRef<Path>) -> Result<Vec<TaskSnapshot>> {
    let path = path.as_ref();
    let payload = fs::read_to_string(path)
        .with_context(|| format!("unable to read snapshot file {}", path.display()))?;
    snapshot::from_json(&payload)
        .with_context(|| format!("malformed snapshot file {}", path.display()))
}
