//! Shared state handed to the recorder, trainer and inference loop.

use std::sync::{Arc, Mutex, RwLock};

use crate::classifier::GestureModel;
use crate::dataset::GestureDataset;
use crate::pose::{FeatureExtractor, Topology};

/// Dataset, active model and feature extractor behind their own locks.
///
/// Lock order when more than one is needed: extractor, dataset, model.
#[derive(Debug)]
pub struct GestureStore {
    dataset: Mutex<GestureDataset>,
    model: RwLock<Option<Arc<GestureModel>>>,
    extractor: RwLock<Arc<FeatureExtractor>>,
}

impl GestureStore {
    /// Store with an empty dataset bound to the extractor's topology.
    pub fn new(extractor: FeatureExtractor) -> Self {
        let dataset = GestureDataset::for_topology(extractor.topology().clone());
        Self::with_dataset(extractor, dataset)
    }

    pub fn with_dataset(extractor: FeatureExtractor, dataset: GestureDataset) -> Self {
        Self {
            dataset: Mutex::new(dataset),
            model: RwLock::new(None),
            extractor: RwLock::new(Arc::new(extractor)),
        }
    }

    pub fn extractor(&self) -> Arc<FeatureExtractor> {
        self.extractor
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn topology(&self) -> Topology {
        self.extractor().topology().clone()
    }

    pub fn read_dataset<R>(&self, f: impl FnOnce(&GestureDataset) -> R) -> R {
        let dataset = self.dataset.lock().unwrap_or_else(|err| err.into_inner());
        f(&dataset)
    }

    pub fn update_dataset<R>(&self, f: impl FnOnce(&mut GestureDataset) -> R) -> R {
        let mut dataset = self.dataset.lock().unwrap_or_else(|err| err.into_inner());
        f(&mut dataset)
    }

    /// Point-in-time copy for training.
    pub fn dataset_snapshot(&self) -> GestureDataset {
        self.read_dataset(GestureDataset::clone)
    }

    pub fn active_model(&self) -> Option<Arc<GestureModel>> {
        self.model
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// Install `model` as the active model, returning the one it replaced.
    pub fn swap_model(&self, model: Option<GestureModel>) -> Option<Arc<GestureModel>> {
        let mut slot = self.model.write().unwrap_or_else(|err| err.into_inner());
        std::mem::replace(&mut *slot, model.map(Arc::new))
    }

    /// Switch topology, discarding the dataset and the active model.
    ///
    /// Samples and models from the old topology are not migrated.
    pub fn set_topology(&self, topology: Topology, min_confidence: f32) {
        let mut extractor = self.extractor.write().unwrap_or_else(|err| err.into_inner());
        *extractor = Arc::new(FeatureExtractor::new(topology.clone(), min_confidence));
        self.update_dataset(|dataset| dataset.rebind(topology));
        self.swap_model(None);
        tracing::info!("Topology changed; dataset and model cleared");
    }
}

impl Default for GestureStore {
    fn default() -> Self {
        Self::new(FeatureExtractor::default())
    }
}
