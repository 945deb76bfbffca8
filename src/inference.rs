//! Continuous classification of detected hands with the active model.

use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{GestureModel, Prediction};
use crate::detector::SharedCapture;
use crate::pose::{HandDetection, Topology};
use crate::status::{StatusEvent, StatusSink};
use crate::store::GestureStore;
use crate::worker::PeriodicWorker;

#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutput {
    NoFrame,
    DetectorFailed,
    /// No hands, no usable features, or no compatible model.
    NoDetection,
    /// One prediction per classified hand, in detection order.
    Detected(Vec<Prediction>),
}

impl InferenceOutput {
    /// Prediction shown on the status line.
    pub fn primary(&self) -> Option<&Prediction> {
        match self {
            InferenceOutput::Detected(predictions) => predictions.first(),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct InferenceLoop {
    store: Arc<GestureStore>,
    capture: SharedCapture,
    status: StatusSink,
    last_status: Option<StatusEvent>,
    rejected: Option<Arc<GestureModel>>,
    reported_missing: bool,
}

impl InferenceLoop {
    pub fn new(store: Arc<GestureStore>, capture: SharedCapture, status: StatusSink) -> Self {
        Self {
            store,
            capture,
            status,
            last_status: None,
            rejected: None,
            reported_missing: false,
        }
    }

    /// Pull one frame, classify it and publish the status line if it changed.
    pub fn step(&mut self) -> InferenceOutput {
        let detections = match self.capture.detect() {
            Ok(Some(detections)) => detections,
            Ok(None) => return InferenceOutput::NoFrame,
            Err(err) => {
                tracing::warn!("Hand detection failed: {err}");
                return InferenceOutput::DetectorFailed;
            }
        };
        let output = self.classify_detections(&detections);
        let event = match output.primary() {
            Some(prediction) => StatusEvent::Detected {
                label: prediction.label.clone(),
            },
            None => StatusEvent::NoDetection,
        };
        self.publish(event);
        output
    }

    pub fn classify_detections(&mut self, detections: &[HandDetection]) -> InferenceOutput {
        let extractor = self.store.extractor();
        let vectors = extractor.extract_all(detections);
        let Some(model) = self.usable_model(extractor.topology()) else {
            return InferenceOutput::NoDetection;
        };
        let mut predictions = Vec::with_capacity(vectors.len());
        for features in vectors.iter().filter(|features| !features.is_empty()) {
            match model.classify(features) {
                Some(prediction) => predictions.push(prediction),
                None => self.reject(
                    &model,
                    format_args!(
                        "feature vector has {} values, model expects {}",
                        features.len(),
                        model.feature_len()
                    ),
                ),
            }
        }
        if predictions.is_empty() {
            InferenceOutput::NoDetection
        } else {
            InferenceOutput::Detected(predictions)
        }
    }

    fn usable_model(&mut self, topology: &Topology) -> Option<Arc<GestureModel>> {
        let Some(model) = self.store.active_model() else {
            if !self.reported_missing {
                tracing::info!("No trained model; gesture inference is idle until one is trained");
                self.reported_missing = true;
            }
            return None;
        };
        self.reported_missing = false;
        if let Err(reason) = model.descriptor.check_compatible(topology) {
            self.reject(&model, reason);
            return None;
        }
        Some(model)
    }

    fn reject(&mut self, model: &Arc<GestureModel>, reason: impl Display) {
        if self
            .rejected
            .as_ref()
            .is_some_and(|rejected| Arc::ptr_eq(rejected, model))
        {
            return;
        }
        tracing::warn!("Active model cannot classify current features: {reason}");
        self.rejected = Some(Arc::clone(model));
    }

    fn publish(&mut self, event: StatusEvent) {
        if self.last_status.as_ref() == Some(&event) {
            return;
        }
        self.status.emit(event.clone());
        self.last_status = Some(event);
    }
}

/// Run `inference` on its own thread, one step per `frame_interval`.
pub fn spawn_inference(
    mut inference: InferenceLoop,
    frame_interval: Duration,
) -> io::Result<PeriodicWorker> {
    PeriodicWorker::spawn("gesture-inference", frame_interval, move || {
        inference.step();
    })
}
