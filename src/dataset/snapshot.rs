use std::{
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LabelSamples;
use crate::{
    app_dirs,
    pose::{FeatureVector, Topology},
};

pub const SNAPSHOT_VERSION: u32 = 2;

/// Serializable copy of a dataset; label order is preserved as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub version: u32,
    /// Topology the samples were extracted with; `None` for unbound datasets.
    #[serde(default)]
    pub topology: Option<Topology>,
    pub labels: Vec<LabelSamples>,
}

impl DatasetSnapshot {
    /// Reason the samples cannot be used with `topology`, if any.
    pub fn check_topology(&self, topology: &Topology) -> Result<(), String> {
        match &self.topology {
            Some(recorded) if recorded == topology => Ok(()),
            Some(recorded) => Err(format!(
                "dataset recorded with a different topology ({} connections, pivot {:?}; current {} connections, pivot {:?})",
                recorded.len(),
                recorded.pivot,
                topology.len(),
                topology.pivot
            )),
            None => Err("dataset does not record the topology it was extracted with".to_string()),
        }
    }

    pub fn samples_for(&self, label: &str) -> Option<&[FeatureVector]> {
        self.labels
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.samples.as_slice())
    }
}

/// Errors that may occur while reading or writing dataset snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to resolve dataset directory: {0}")]
    Dir(#[from] app_dirs::AppDirError),
    #[error("Failed to read dataset snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write dataset snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid dataset snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize dataset snapshot: {0}")]
    Serialize(serde_json::Error),
    #[error("Unsupported dataset snapshot version {found} in {path}")]
    Version { path: PathBuf, found: u32 },
}

/// Default location for the snapshot named `name`.
pub fn snapshot_path(name: &str) -> Result<PathBuf, SnapshotError> {
    Ok(app_dirs::datasets_dir()?.join(format!("{name}.json")))
}

/// Load a snapshot, returning `None` when the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<DatasetSnapshot>, SnapshotError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let snapshot: DatasetSnapshot =
        serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            path: path.to_path_buf(),
            found: snapshot.version,
        });
    }
    Ok(Some(snapshot))
}

/// Write a snapshot through a temporary file so readers never see a partial file.
pub fn save_snapshot(path: &Path, snapshot: &DatasetSnapshot) -> Result<(), SnapshotError> {
    let write_err = |source: std::io::Error| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let json = serde_json::to_vec(snapshot).map_err(SnapshotError::Serialize)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
