use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::ml::mlp::TrainOptions;
use crate::pose::{Connection, Topology};
use crate::recording::RecordingOptions;

/// Everything persisted in `config.toml`. Missing sections and keys fall back
/// to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub recording: RecordingSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub topology: TopologySettings,
    #[serde(default)]
    pub model: ModelSettings,
}

impl AppSettings {
    /// Clamp out-of-range values back into something usable.
    pub fn normalized(self) -> Self {
        Self {
            recording: self.recording.normalized(),
            inference: self.inference.normalized(),
            training: self.training.normalized(),
            topology: self.topology.normalized(),
            model: self.model.normalized(),
        }
    }
}

/// Config keys: `duration_ms`, `sample_interval_ms`, `persist_dataset`, `dataset_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSettings {
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Save the dataset after every sample and restore labels from it.
    #[serde(default = "default_false")]
    pub persist_dataset: bool,
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            persist_dataset: default_false(),
            dataset_name: default_dataset_name(),
        }
    }
}

impl RecordingSettings {
    fn normalized(mut self) -> Self {
        self.duration_ms = self.duration_ms.clamp(MIN_DURATION_MS, MAX_DURATION_MS);
        self.sample_interval_ms = self
            .sample_interval_ms
            .clamp(MIN_SAMPLE_INTERVAL_MS, MAX_INTERVAL_MS);
        if !is_safe_file_stem(&self.dataset_name) {
            self.dataset_name = default_dataset_name();
        }
        self
    }

    pub fn options(&self, snapshot_path: Option<PathBuf>) -> RecordingOptions {
        RecordingOptions {
            duration: Duration::from_millis(self.duration_ms),
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            snapshot_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Pause between inference frames; 0 runs back to back.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl InferenceSettings {
    fn normalized(mut self) -> Self {
        self.frame_interval_ms = self.frame_interval_ms.min(MAX_INTERVAL_MS);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Classifier hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_hidden_sizes")]
    pub hidden_sizes: Vec<usize>,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_l2_penalty")]
    pub l2_penalty: f32,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
    #[serde(default = "default_validation_split")]
    pub validation_split: f32,
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            hidden_sizes: default_hidden_sizes(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            l2_penalty: default_l2_penalty(),
            dropout: default_dropout(),
            validation_split: default_validation_split(),
            patience: default_patience(),
            seed: default_seed(),
        }
    }
}

impl TrainingSettings {
    fn normalized(mut self) -> Self {
        self.hidden_sizes.retain(|&units| units > 0);
        self.epochs = self.epochs.clamp(1, 10_000);
        self.batch_size = self.batch_size.max(1);
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            self.learning_rate = default_learning_rate();
        }
        if !(self.l2_penalty.is_finite() && self.l2_penalty >= 0.0) {
            self.l2_penalty = default_l2_penalty();
        }
        self.dropout = clamp_or(self.dropout, 0.0, 0.9, default_dropout());
        self.validation_split = clamp_or(self.validation_split, 0.0, 0.5, default_validation_split());
        self
    }

    pub fn options(&self) -> TrainOptions {
        TrainOptions {
            hidden_sizes: self.hidden_sizes.clone(),
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            l2_penalty: self.l2_penalty,
            dropout: self.dropout,
            validation_split: self.validation_split,
            patience: self.patience,
            seed: self.seed,
            ..TrainOptions::default()
        }
    }
}

/// Config keys: `connections`, `pivot` (empty disables angles), `min_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySettings {
    #[serde(default = "default_connections")]
    pub connections: Vec<Connection>,
    #[serde(default = "default_pivot")]
    pub pivot: String,
    #[serde(default)]
    pub min_confidence: f32,
}

impl Default for TopologySettings {
    fn default() -> Self {
        Self {
            connections: default_connections(),
            pivot: default_pivot(),
            min_confidence: 0.0,
        }
    }
}

impl TopologySettings {
    fn normalized(mut self) -> Self {
        self.connections
            .retain(|connection| !connection.start().is_empty() && !connection.end().is_empty());
        if self.connections.is_empty() {
            self.connections = default_connections();
        }
        self.pivot = self.pivot.trim().to_string();
        self.min_confidence = clamp_or(self.min_confidence, 0.0, 1.0, 0.0);
        self
    }

    pub fn topology(&self) -> Topology {
        let pivot = Some(self.pivot.clone()).filter(|pivot| !pivot.is_empty());
        Topology::new(self.connections.clone(), pivot)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// File stem of the persisted model under the models directory.
    #[serde(default = "default_model_key")]
    pub key: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            key: default_model_key(),
        }
    }
}

impl ModelSettings {
    fn normalized(mut self) -> Self {
        if !is_safe_file_stem(&self.key) {
            self.key = default_model_key();
        }
        self
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
