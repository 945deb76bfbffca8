//! JSON persistence for trained gesture models.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::app_dirs;
use crate::classifier::GestureModel;
use crate::pose::Topology;

/// Key the trainer saves under and the session loads from.
pub const MODEL_KEY: &str = "gesture-model";

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("Failed to resolve model directory: {0}")]
    Dir(#[from] app_dirs::AppDirError),
    #[error("Invalid model key {0:?}")]
    InvalidKey(String),
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write model {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid model file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize model: {0}")]
    Serialize(serde_json::Error),
    #[error("Model {path} is malformed: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("Model {key:?} does not match the active topology: {reason}")]
    Incompatible { key: String, reason: String },
}

/// Directory of `<key>.json` model files.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the app `models` directory.
    pub fn open_default() -> Result<Self, ModelStoreError> {
        Ok(Self::new(app_dirs::models_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, ModelStoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(ModelStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Replace the model stored under `key`.
    pub fn save(&self, key: &str, model: &GestureModel) -> Result<PathBuf, ModelStoreError> {
        let path = self.path_for(key)?;
        let write_err = |source: std::io::Error| ModelStoreError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(write_err)?;
        let json = serde_json::to_vec_pretty(model).map_err(ModelStoreError::Serialize)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(&path).map_err(|err| write_err(err.error))?;
        tracing::info!("Saved model {key:?} to {}", path.display());
        Ok(path)
    }

    /// Load the model stored under `key`; `Ok(None)` when nothing was saved.
    pub fn load(&self, key: &str) -> Result<Option<GestureModel>, ModelStoreError> {
        let path = self.path_for(key)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ModelStoreError::Read { path, source }),
        };
        let model: GestureModel =
            serde_json::from_slice(&bytes).map_err(|source| ModelStoreError::Parse {
                path: path.clone(),
                source,
            })?;
        model
            .validate()
            .map_err(|reason| ModelStoreError::Invalid { path, reason })?;
        Ok(Some(model))
    }

    /// Like [`ModelStore::load`], but fails when the model was trained on another topology.
    pub fn load_compatible(
        &self,
        key: &str,
        topology: &Topology,
    ) -> Result<Option<GestureModel>, ModelStoreError> {
        let Some(model) = self.load(key)? else {
            return Ok(None);
        };
        model
            .descriptor
            .check_compatible(topology)
            .map_err(|reason| ModelStoreError::Incompatible {
                key: key.to_string(),
                reason,
            })?;
        Ok(Some(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::larger_input_model;
    use crate::pose::Connection;
    use tempfile::tempdir;

    #[test]
    fn missing_model_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(store.load(MODEL_KEY).unwrap().is_none());
    }

    #[test]
    fn save_replaces_previous_model() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models"));
        let mut model = larger_input_model(Topology::default());
        store.save(MODEL_KEY, &model).unwrap();

        model.classifier.output.bias = vec![0.5, -0.5];
        store.save(MODEL_KEY, &model).unwrap();
        assert_eq!(store.load(MODEL_KEY).unwrap(), Some(model));
    }

    #[test]
    fn incompatible_topology_fails_fast() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store
            .save(MODEL_KEY, &larger_input_model(Topology::default()))
            .unwrap();
        let other = Topology::new(vec![Connection::new("wrist", "thumb_tip")], None);
        assert!(matches!(
            store.load_compatible(MODEL_KEY, &other),
            Err(ModelStoreError::Incompatible { .. })
        ));
        assert!(
            store
                .load_compatible(MODEL_KEY, &Topology::default())
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn malformed_model_is_rejected() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let mut model = larger_input_model(Topology::default());
        model.descriptor.feature_len = 7;
        store.save(MODEL_KEY, &model).unwrap();
        assert!(matches!(
            store.load(MODEL_KEY),
            Err(ModelStoreError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_path_like_keys() {
        let store = ModelStore::new("models");
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("gesture-model").is_ok());
    }
}
