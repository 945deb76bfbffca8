//! Timed recording of labeled samples.
//!
//! [`RecordingController::start_recording`] arms the controller for a label
//! until a deadline. While armed, each sampler tick runs the detector once and
//! appends the first hand's features to the dataset. A per-session timer
//! thread returns the controller to idle when the deadline passes; every
//! session carries a generation number so a timer left over from an earlier
//! session never ends a newer one.

mod sampler;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::dataset::{AppendOutcome, DatasetSnapshot, load_snapshot, save_snapshot};
use crate::detector::SharedCapture;
use crate::status::{StatusEvent, StatusSink};
use crate::store::GestureStore;

pub use sampler::spawn_sampler;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOptions {
    /// How long one recording session stays armed.
    pub duration: Duration,
    /// Period of the sampler thread.
    pub sample_interval: Duration,
    /// Dataset snapshot written after every accepted sample, and read to
    /// hydrate labels seen for the first time.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            snapshot_path: None,
        }
    }
}

/// The active recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub label: String,
    pub started_at: Instant,
    pub deadline: Instant,
    /// Samples accepted during this session.
    pub sample_count: usize,
    generation: u64,
}

impl RecordingSession {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingState {
    Idle,
    Recording { label: String, deadline: Instant },
}

/// What a single sampler tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not recording, or the session ended while the detector ran.
    Idle,
    /// The deadline had passed; the session was closed without sampling.
    Expired,
    NoFrame,
    DetectorFailed,
    /// No hand, or no complete connection on the first hand.
    NoDetection,
    /// The dataset refused the vector.
    Rejected(AppendOutcome),
    Recorded { label: String, count: usize },
}

#[derive(Debug, Default)]
struct ControllerState {
    session: Option<RecordingSession>,
    next_generation: u64,
}

#[derive(Debug)]
struct Shared {
    store: Arc<GestureStore>,
    capture: SharedCapture,
    clock: Arc<dyn Clock>,
    status: StatusSink,
    options: RecordingOptions,
    state: Mutex<ControllerState>,
}

/// Cloneable handle to the recording state machine.
///
/// Lock order: controller state, then the store's dataset.
#[derive(Debug, Clone)]
pub struct RecordingController {
    shared: Arc<Shared>,
}

impl RecordingController {
    pub fn new(
        store: Arc<GestureStore>,
        capture: SharedCapture,
        clock: Arc<dyn Clock>,
        status: StatusSink,
        options: RecordingOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                capture,
                clock,
                status,
                options,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    pub fn options(&self) -> &RecordingOptions {
        &self.shared.options
    }

    pub fn store(&self) -> &Arc<GestureStore> {
        &self.shared.store
    }

    /// Arm the controller for `label` until `now + duration`.
    ///
    /// Calling this while a session is active replaces that session.
    pub fn start_recording(&self, label: &str) -> RecordingSession {
        let saved = self.load_saved_snapshot();
        let now = self.shared.clock.now();
        let session = {
            let mut state = self.lock_state();
            if let Some(active) = &state.session {
                tracing::warn!(
                    "Starting '{label}' while '{}' is still recording; the earlier session ends now",
                    active.label
                );
            }
            state.next_generation += 1;
            let session = RecordingSession {
                label: label.to_string(),
                started_at: now,
                deadline: now + self.shared.options.duration,
                sample_count: 0,
                generation: state.next_generation,
            };
            state.session = Some(session.clone());
            self.shared
                .store
                .update_dataset(|dataset| dataset.ensure_label_from(label, saved.as_ref()));
            session
        };
        tracing::info!(
            "Recording '{label}' for {:?}",
            self.shared.options.duration
        );
        self.shared.status.emit(StatusEvent::Recording {
            label: label.to_string(),
        });
        self.spawn_deadline_timer(session.generation, self.shared.options.duration);
        session
    }

    /// End session `generation` if it is still the active one.
    pub fn finish_session(&self, generation: u64) -> bool {
        let finished = {
            let mut state = self.lock_state();
            match &state.session {
                Some(session) if session.generation == generation => state.session.take(),
                _ => None,
            }
        };
        let Some(session) = finished else {
            return false;
        };
        tracing::info!(
            "Finished recording '{}' with {} samples",
            session.label,
            session.sample_count
        );
        self.shared.status.emit(StatusEvent::Cleared);
        true
    }

    /// End whatever session is active.
    pub fn stop_recording(&self) -> bool {
        let generation = self.lock_state().session.as_ref().map(|s| s.generation);
        generation.is_some_and(|generation| self.finish_session(generation))
    }

    /// One sampler step. Never appends at or after the session deadline.
    pub fn tick(&self) -> TickOutcome {
        let generation = {
            let state = self.lock_state();
            let Some(session) = &state.session else {
                return TickOutcome::Idle;
            };
            if session.is_expired_at(self.shared.clock.now()) {
                let generation = session.generation;
                drop(state);
                self.finish_session(generation);
                return TickOutcome::Expired;
            }
            session.generation
        };

        let detections = match self.shared.capture.detect() {
            Ok(Some(detections)) => detections,
            Ok(None) => return TickOutcome::NoFrame,
            Err(err) => {
                tracing::warn!("Hand detection failed while recording: {err}");
                return TickOutcome::DetectorFailed;
            }
        };
        let features = self.shared.store.extractor().extract_first(&detections);
        if features.is_empty() {
            return TickOutcome::NoDetection;
        }

        let mut state = self.lock_state();
        let Some(session) = state.session.as_mut().filter(|s| s.generation == generation) else {
            return TickOutcome::Idle;
        };
        if session.is_expired_at(self.shared.clock.now()) {
            drop(state);
            self.finish_session(generation);
            return TickOutcome::Expired;
        }
        let label = session.label.clone();
        let outcome = self
            .shared
            .store
            .update_dataset(|dataset| dataset.append(&label, features));
        if !outcome.is_appended() {
            return TickOutcome::Rejected(outcome);
        }
        session.sample_count += 1;
        let count = session.sample_count;
        drop(state);

        self.persist_snapshot();
        self.shared.status.emit(StatusEvent::Recorded {
            label: label.clone(),
            count,
        });
        TickOutcome::Recorded { label, count }
    }

    pub fn state(&self) -> RecordingState {
        match &self.lock_state().session {
            Some(session) => RecordingState::Recording {
                label: session.label.clone(),
                deadline: session.deadline,
            },
            None => RecordingState::Idle,
        }
    }

    pub fn session(&self) -> Option<RecordingSession> {
        self.lock_state().session.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.lock_state().session.is_some()
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    fn spawn_deadline_timer(&self, generation: u64, wait: Duration) {
        let controller = self.clone();
        let spawned = thread::Builder::new()
            .name("recording-deadline".to_string())
            .spawn(move || {
                thread::sleep(wait);
                controller.finish_session(generation);
            });
        if let Err(err) = spawned {
            tracing::warn!("Recording timer failed to start ({err}); the next tick ends the session");
        }
    }

    fn load_saved_snapshot(&self) -> Option<DatasetSnapshot> {
        let path = self.shared.options.snapshot_path.as_ref()?;
        let snapshot = match load_snapshot(path) {
            Ok(snapshot) => snapshot?,
            Err(err) => {
                tracing::warn!("Ignoring saved dataset: {err}");
                return None;
            }
        };
        if let Err(reason) = snapshot.check_topology(&self.shared.store.topology()) {
            tracing::warn!("Ignoring saved dataset {}: {reason}", path.display());
            return None;
        }
        Some(snapshot)
    }

    fn persist_snapshot(&self) {
        let Some(path) = &self.shared.options.snapshot_path else {
            return;
        };
        let snapshot = self.shared.store.read_dataset(|dataset| dataset.snapshot());
        if let Err(err) = save_snapshot(path, &snapshot) {
            tracing::warn!("Failed to save dataset: {err}");
        }
    }
}
