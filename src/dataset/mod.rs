//! Labeled feature vectors collected by the recording controller.
//!
//! Labels keep first-seen order for the lifetime of the dataset. That order is
//! the class index assignment used by training and inference, so it is never
//! re-sorted.

mod snapshot;

use serde::{Deserialize, Serialize};

use crate::pose::{FeatureVector, Topology};

pub use snapshot::{
    DatasetSnapshot, SNAPSHOT_VERSION, SnapshotError, load_snapshot, save_snapshot, snapshot_path,
};

/// Samples recorded under one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSamples {
    pub label: String,
    pub samples: Vec<FeatureVector>,
}

/// Result of offering a vector to the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored; `count` is the label's sample count afterwards.
    Appended { count: usize },
    /// Empty vectors carry no usable features.
    Empty,
    /// At least one value was NaN or infinite.
    NonFinite,
    /// Length differs from the full feature length of the dataset's topology.
    LengthMismatch { expected: usize, actual: usize },
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

/// Labeled samples, optionally bound to the topology that produced them.
///
/// A bound dataset only accepts vectors of the topology's full feature
/// length, so a hand with a missing keypoint never skews the row width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureDataset {
    entries: Vec<LabelSamples>,
    topology: Option<Topology>,
}

impl GestureDataset {
    /// Unbound dataset; any non-empty finite vector is accepted.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_topology(topology: Topology) -> Self {
        Self {
            entries: Vec::new(),
            topology: Some(topology),
        }
    }

    /// Rebuild a dataset from a snapshot, re-validating every stored vector
    /// against the snapshot's topology.
    pub fn from_snapshot(snapshot: &DatasetSnapshot) -> Self {
        let mut dataset = Self {
            entries: Vec::new(),
            topology: snapshot.topology.clone(),
        };
        for entry in &snapshot.labels {
            dataset.ensure_label(&entry.label);
            for sample in &entry.samples {
                dataset.append(&entry.label, sample.clone());
            }
        }
        dataset
    }

    pub fn snapshot(&self) -> DatasetSnapshot {
        DatasetSnapshot {
            version: SNAPSHOT_VERSION,
            topology: self.topology.clone(),
            labels: self.entries.clone(),
        }
    }

    /// Materialize `label` with no samples. Returns `true` if it was new.
    pub fn ensure_label(&mut self, label: &str) -> bool {
        self.ensure_label_from(label, None)
    }

    /// Materialize `label`, seeding it from `snapshot` when the snapshot holds
    /// samples under the same name. Existing labels are left untouched.
    pub fn ensure_label_from(&mut self, label: &str, snapshot: Option<&DatasetSnapshot>) -> bool {
        if self.position(label).is_some() {
            return false;
        }
        self.entries.push(LabelSamples {
            label: label.to_string(),
            samples: Vec::new(),
        });
        let hydrated = snapshot.and_then(|snapshot| snapshot.samples_for(label));
        if let Some(samples) = hydrated {
            let mut restored = 0usize;
            for sample in samples {
                if self.append(label, sample.clone()).is_appended() {
                    restored += 1;
                }
            }
            tracing::info!("Restored {restored} saved samples for gesture '{label}'");
        }
        true
    }

    /// Append `vector` under `label`, creating the label if needed.
    ///
    /// Invalid vectors are skipped and logged; the dataset is left unchanged,
    /// including its label set.
    pub fn append(&mut self, label: &str, vector: FeatureVector) -> AppendOutcome {
        if vector.is_empty() {
            return AppendOutcome::Empty;
        }
        if vector.iter().any(|value| !value.is_finite()) {
            tracing::warn!("Skipping non-finite feature vector for gesture '{label}'");
            return AppendOutcome::NonFinite;
        }
        if let Some(expected) = self.feature_len()
            && vector.len() != expected
        {
            tracing::debug!(
                "Skipping partial feature vector for gesture '{label}': length {} (expected {expected})",
                vector.len()
            );
            return AppendOutcome::LengthMismatch {
                expected,
                actual: vector.len(),
            };
        }

        let idx = match self.position(label) {
            Some(idx) => idx,
            None => {
                self.entries.push(LabelSamples {
                    label: label.to_string(),
                    samples: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let samples = &mut self.entries[idx].samples;
        samples.push(vector);
        AppendOutcome::Appended {
            count: samples.len(),
        }
    }

    /// Labels in first-seen order.
    pub fn labels(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    pub fn entries(&self) -> &[LabelSamples] {
        &self.entries
    }

    pub fn samples(&self, label: &str) -> Option<&[FeatureVector]> {
        self.position(label)
            .map(|idx| self.entries[idx].samples.as_slice())
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    /// Full feature length of the bound topology; `None` when unbound.
    pub fn feature_len(&self) -> Option<usize> {
        self.topology.as_ref().map(Topology::max_feature_len)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.samples.len()).sum()
    }

    /// Drop every label and unbind from the topology.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.topology = None;
    }

    /// Drop every label and bind to `topology`.
    pub fn rebind(&mut self, topology: Topology) {
        self.entries.clear();
        self.topology = Some(topology);
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.label == label)
    }
}
