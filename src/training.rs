//! Turns the recorded dataset into a trained, persisted gesture model.

use thiserror::Error;

use crate::classifier::{GestureModel, ModelDescriptor};
use crate::dataset::{GestureDataset, LabelSamples};
use crate::ml::mlp::{TrainOptions, TrainReport, TrainSet, train_mlp};
use crate::model_store::{MODEL_KEY, ModelStore, ModelStoreError};
use crate::pose::Topology;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("No trainable samples; record a gesture first")]
    NoTrainableData,
    #[error("Cannot train: {0}")]
    TopologyMismatch(String),
    #[error("Training failed: {0}")]
    Fit(String),
    #[error("Failed to persist trained model: {0}")]
    Persist(#[from] ModelStoreError),
}

/// Fits a fresh classifier to the whole dataset on every call.
#[derive(Debug, Clone)]
pub struct ClassifierTrainer {
    options: TrainOptions,
    model_store: Option<ModelStore>,
    model_key: String,
}

impl ClassifierTrainer {
    pub fn new(options: TrainOptions) -> Self {
        Self {
            options,
            model_store: None,
            model_key: MODEL_KEY.to_string(),
        }
    }

    /// Persist every trained model to `store` under `key`.
    pub fn persist_to(mut self, store: ModelStore, key: impl Into<String>) -> Self {
        self.model_store = Some(store);
        self.model_key = key.into();
        self
    }

    pub fn options(&self) -> &TrainOptions {
        &self.options
    }

    /// Train without persisting.
    pub fn fit(
        &self,
        dataset: &GestureDataset,
        topology: &Topology,
    ) -> Result<(GestureModel, TrainReport), TrainError> {
        let set = build_train_set(dataset, topology)?;
        tracing::info!(
            "Training on {} samples, {} features, {} gestures",
            set.x.len(),
            set.feature_len_f32,
            set.classes.len()
        );
        let (classifier, report) = train_mlp(&set, &self.options).map_err(TrainError::Fit)?;
        tracing::info!(
            "Trained {} epochs (kept epoch {}, early stop: {}): loss {:.4}, val loss {}, accuracy {:.3}",
            report.epochs_run,
            report.best_epoch,
            report.stopped_early,
            report.train_loss,
            report
                .validation_loss
                .map_or_else(|| "n/a".to_string(), |loss| format!("{loss:.4}")),
            report.train_accuracy
        );
        let model = GestureModel {
            descriptor: ModelDescriptor {
                topology: topology.clone(),
                feature_len: set.feature_len_f32,
                labels: set.classes,
            },
            classifier,
        };
        Ok((model, report))
    }

    /// Train and, when a store is configured, persist the result.
    ///
    /// Nothing is written unless training succeeds.
    pub fn train(
        &self,
        dataset: &GestureDataset,
        topology: &Topology,
    ) -> Result<(GestureModel, TrainReport), TrainError> {
        let (model, report) = self.fit(dataset, topology)?;
        if let Some(store) = &self.model_store {
            store.save(&self.model_key, &model)?;
        }
        Ok((model, report))
    }
}

/// Rows and class indices for every usable sample, in dataset label order.
///
/// Rows must have the full feature length of `topology`. A dataset bound to
/// another topology is refused outright.
pub fn build_train_set(dataset: &GestureDataset, topology: &Topology) -> Result<TrainSet, TrainError> {
    if let Some(recorded) = dataset.topology()
        && recorded != topology
    {
        return Err(TrainError::TopologyMismatch(format!(
            "samples were recorded with {} connections (pivot {:?}), training topology has {} (pivot {:?})",
            recorded.len(),
            recorded.pivot,
            topology.len(),
            topology.pivot
        )));
    }
    collect_rows(dataset.entries(), topology.max_feature_len())
}

/// Label `i` of `entries` becomes class `i`, samples or not. Vectors of the
/// wrong length or with non-finite values are dropped.
fn collect_rows(entries: &[LabelSamples], feature_len: usize) -> Result<TrainSet, TrainError> {
    if feature_len == 0 {
        return Err(TrainError::NoTrainableData);
    }

    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut dropped = 0usize;
    for (class, entry) in entries.iter().enumerate() {
        for sample in &entry.samples {
            if sample.len() != feature_len || sample.iter().any(|v| !v.is_finite()) {
                dropped += 1;
                continue;
            }
            x.push(sample.clone());
            y.push(class);
        }
    }
    if dropped > 0 {
        tracing::warn!("Excluded {dropped} malformed samples from training");
    }
    if x.is_empty() {
        return Err(TrainError::NoTrainableData);
    }
    Ok(TrainSet {
        feature_len_f32: feature_len,
        classes: entries.iter().map(|entry| entry.label.clone()).collect(),
        x,
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Connection;
    use tempfile::tempdir;

    fn entry(label: &str, samples: Vec<Vec<f32>>) -> LabelSamples {
        LabelSamples {
            label: label.to_string(),
            samples,
        }
    }

    fn two_connections() -> Topology {
        Topology::new(
            vec![
                Connection::new("wrist", "thumb_tip"),
                Connection::new("wrist", "index_finger_tip"),
            ],
            None,
        )
    }

    fn quick_trainer() -> ClassifierTrainer {
        ClassifierTrainer::new(TrainOptions {
            epochs: 2,
            ..TrainOptions::default()
        })
    }

    #[test]
    fn class_indices_follow_label_order() {
        let mut dataset = GestureDataset::for_topology(two_connections());
        dataset.append("zeta", vec![1.0, 2.0]);
        dataset.append("alpha", vec![3.0, 4.0]);
        dataset.append("zeta", vec![1.5, 2.5]);

        let set = build_train_set(&dataset, &two_connections()).unwrap();
        assert_eq!(set.classes, vec!["zeta", "alpha"]);
        assert_eq!(set.y, vec![0, 0, 1]);
        assert_eq!(set.feature_len_f32, 2);
    }

    #[test]
    fn retraining_keeps_earlier_class_indices() {
        let topology = two_connections();
        let mut dataset = GestureDataset::for_topology(topology.clone());
        dataset.append("zeta", vec![1.0, 2.0]);
        dataset.append("alpha", vec![3.0, 4.0]);
        let (first, _) = quick_trainer().fit(&dataset, &topology).unwrap();

        dataset.append("beta", vec![5.0, 6.0]);
        dataset.append("zeta", vec![1.2, 2.2]);
        let (second, _) = quick_trainer().fit(&dataset, &topology).unwrap();

        assert_eq!(first.labels(), ["zeta", "alpha"]);
        assert_eq!(second.labels(), ["zeta", "alpha", "beta"]);
        assert_eq!(second.labels()[..first.labels().len()], *first.labels());
        let set = build_train_set(&dataset, &topology).unwrap();
        assert_eq!(set.y, vec![0, 0, 1, 2]);
    }

    #[test]
    fn labels_without_rows_keep_their_index() {
        let topology = Topology::new(vec![Connection::new("wrist", "thumb_tip")], None);
        let mut dataset = GestureDataset::for_topology(topology.clone());
        dataset.ensure_label("empty");
        dataset.append("wave", vec![1.0]);
        let set = build_train_set(&dataset, &topology).unwrap();
        assert_eq!(set.classes, vec!["empty", "wave"]);
        assert_eq!(set.y, vec![1]);
    }

    #[test]
    fn malformed_rows_are_excluded() {
        let entries = vec![
            entry("a", vec![vec![1.0, 2.0], vec![f32::NAN, 1.0], vec![1.0]]),
            entry("b", vec![vec![4.0, 5.0], vec![]]),
        ];
        let set = collect_rows(&entries, 2).unwrap();
        assert_eq!(set.x, vec![vec![1.0, 2.0], vec![4.0, 5.0]]);
        assert_eq!(set.y, vec![0, 1]);
    }

    #[test]
    fn rows_shorter_than_the_topology_are_dropped() {
        let mut dataset = GestureDataset::new();
        dataset.append("open", vec![1.0; 6]);
        dataset.append("open", vec![1.0; 18]);
        dataset.append("fist", vec![0.5; 18]);
        let set = build_train_set(&dataset, &Topology::default()).unwrap();
        assert_eq!(set.feature_len_f32, 18);
        assert_eq!(set.y, vec![0, 1]);
    }

    #[test]
    fn dataset_from_another_topology_is_refused() {
        let mut dataset = GestureDataset::for_topology(two_connections());
        dataset.append("wave", vec![1.0, 2.0]);
        let mut swapped = two_connections();
        swapped.connections.reverse();
        assert!(matches!(
            build_train_set(&dataset, &swapped),
            Err(TrainError::TopologyMismatch(_))
        ));
    }

    #[test]
    fn empty_corpus_is_not_trainable() {
        let topology = Topology::default();
        assert!(matches!(
            build_train_set(&GestureDataset::new(), &topology),
            Err(TrainError::NoTrainableData)
        ));
        let mut labels_only = GestureDataset::new();
        labels_only.ensure_label("wave");
        assert!(matches!(
            build_train_set(&labels_only, &topology),
            Err(TrainError::NoTrainableData)
        ));
        let entries = vec![entry("a", vec![vec![f32::INFINITY]])];
        assert!(matches!(
            collect_rows(&entries, 1),
            Err(TrainError::NoTrainableData)
        ));
        assert!(matches!(
            collect_rows(&[entry("a", vec![vec![1.0]])], 0),
            Err(TrainError::NoTrainableData)
        ));
    }

    #[test]
    fn failed_training_persists_nothing() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let trainer =
            ClassifierTrainer::new(TrainOptions::default()).persist_to(store.clone(), MODEL_KEY);
        assert!(trainer.train(&GestureDataset::new(), &Topology::default()).is_err());
        assert!(store.load(MODEL_KEY).unwrap().is_none());
    }

    #[test]
    fn trained_model_carries_descriptor() {
        let topology = two_connections();
        let mut dataset = GestureDataset::for_topology(topology.clone());
        for i in 0..4 {
            let jitter = i as f32 * 0.01;
            dataset.append("open", vec![1.0 + jitter, 0.2]);
            dataset.append("fist", vec![0.1, 1.0 + jitter]);
        }
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let options = TrainOptions {
            epochs: 3,
            ..TrainOptions::default()
        };
        let trainer = ClassifierTrainer::new(options).persist_to(store.clone(), "unit");
        let (model, report) = trainer.train(&dataset, &topology).unwrap();
        assert_eq!(model.descriptor.labels, vec!["open", "fist"]);
        assert_eq!(model.descriptor.feature_len, 2);
        assert_eq!(model.descriptor.topology, topology);
        assert_eq!(report.train_rows + report.validation_rows, 8);
        let loaded = store.load("unit").unwrap().unwrap();
        assert_eq!(loaded.descriptor, model.descriptor);
    }
}
