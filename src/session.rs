//! One running gesture session: shared store, recorder, trainer and the two
//! background loops.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::config::{AppSettings, TopologySettings};
use crate::dataset::snapshot_path;
use crate::detector::SharedCapture;
use crate::inference::{InferenceLoop, spawn_inference};
use crate::ml::mlp::TrainReport;
use crate::model_store::{ModelStore, ModelStoreError};
use crate::pose::FeatureExtractor;
use crate::recording::{RecordingController, spawn_sampler};
use crate::status::{StatusEvent, StatusSink};
use crate::store::GestureStore;
use crate::training::{ClassifierTrainer, TrainError};
use crate::worker::PeriodicWorker;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to start {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct Session {
    store: Arc<GestureStore>,
    recorder: RecordingController,
    trainer: ClassifierTrainer,
    capture: SharedCapture,
    status: StatusSink,
    frame_interval: Duration,
    workers: Vec<PeriodicWorker>,
}

impl Session {
    /// Build a session from settings and restore the saved model if it fits
    /// the configured topology. Background loops are not started.
    pub fn new(
        settings: &AppSettings,
        capture: SharedCapture,
        model_store: Option<ModelStore>,
        status: StatusSink,
    ) -> Self {
        Self::with_clock(settings, capture, model_store, status, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: &AppSettings,
        capture: SharedCapture,
        model_store: Option<ModelStore>,
        status: StatusSink,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let topology = settings.topology.topology();
        let store = Arc::new(GestureStore::new(FeatureExtractor::new(
            topology.clone(),
            settings.topology.min_confidence,
        )));

        let mut trainer = ClassifierTrainer::new(settings.training.options());
        if let Some(models) = model_store {
            restore_model(&store, &models, &settings.model.key);
            trainer = trainer.persist_to(models, settings.model.key.clone());
        }

        let snapshot = if settings.recording.persist_dataset {
            snapshot_path(&settings.recording.dataset_name)
                .inspect_err(|err| tracing::warn!("Dataset persistence disabled: {err}"))
                .ok()
        } else {
            None
        };
        let recorder = RecordingController::new(
            Arc::clone(&store),
            capture.clone(),
            clock,
            status.clone(),
            settings.recording.options(snapshot),
        );

        Self {
            store,
            recorder,
            trainer,
            capture,
            status,
            frame_interval: settings.inference.frame_interval(),
            workers: Vec::new(),
        }
    }

    /// Start the sampler and inference threads. No-op when already running.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if !self.workers.is_empty() {
            return Ok(());
        }
        let sampler = spawn_sampler(self.recorder.clone()).map_err(|source| SessionError::Spawn {
            name: "recording-sampler",
            source,
        })?;
        self.workers.push(sampler);
        let inference = spawn_inference(self.inference_loop(), self.frame_interval).map_err(
            |source| SessionError::Spawn {
                name: "gesture-inference",
                source,
            },
        );
        match inference {
            Ok(worker) => self.workers.push(worker),
            Err(err) => {
                self.stop();
                return Err(err);
            }
        }
        tracing::info!("Gesture session started");
        Ok(())
    }

    /// Stop and join the background threads.
    pub fn stop(&mut self) {
        for mut worker in self.workers.drain(..) {
            worker.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// The record button: start recording `label`, then retrain on everything
    /// recorded so far if there is anything to train on.
    ///
    /// Returns `Ok(None)` when no samples exist yet.
    pub fn trigger(&self, label: &str) -> Result<Option<TrainReport>, TrainError> {
        self.status.emit(StatusEvent::StartedRecording {
            label: label.to_string(),
        });
        self.recorder.start_recording(label);
        if self.store.read_dataset(|dataset| dataset.sample_count() == 0) {
            return Ok(None);
        }
        self.train().map(Some)
    }

    /// Train on a snapshot of the dataset, persist, and swap the result in.
    ///
    /// On failure the active model is left as it was.
    pub fn train(&self) -> Result<TrainReport, TrainError> {
        let dataset = self.store.dataset_snapshot();
        let topology = self.store.topology();
        match self.trainer.train(&dataset, &topology) {
            Ok((model, report)) => {
                self.store.swap_model(Some(model));
                self.status.emit(StatusEvent::ModelTrained);
                Ok(report)
            }
            Err(err) => {
                tracing::warn!("{err}");
                self.status.emit(StatusEvent::TrainingFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Switch topology. Recorded samples and the active model are discarded.
    pub fn set_topology(&self, settings: &TopologySettings) {
        self.recorder.stop_recording();
        self.store
            .set_topology(settings.topology(), settings.min_confidence);
    }

    /// A fresh inference loop over this session's store and capture.
    pub fn inference_loop(&self) -> InferenceLoop {
        InferenceLoop::new(
            Arc::clone(&self.store),
            self.capture.clone(),
            self.status.clone(),
        )
    }

    pub fn store(&self) -> &Arc<GestureStore> {
        &self.store
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn restore_model(store: &GestureStore, models: &ModelStore, key: &str) {
    match models.load_compatible(key, &store.topology()) {
        Ok(Some(model)) => {
            tracing::info!(
                "Loaded model {key:?} with {} gestures",
                model.labels().len()
            );
            store.swap_model(Some(model));
        }
        Ok(None) => tracing::info!("No saved model {key:?}; inference disabled until training"),
        Err(err @ ModelStoreError::Incompatible { .. }) => {
            tracing::warn!("{err}; starting without a model");
        }
        Err(err) => tracing::warn!("Failed to load model {key:?}: {err}"),
    }
}
