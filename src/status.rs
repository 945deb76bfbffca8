//! Status lines published to whatever is presenting the session.

use std::fmt;
use std::sync::mpsc::{Receiver, Sender, channel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusTone {
    Idle,
    Busy,
    Info,
    Warning,
    Error,
}

impl StatusTone {
    pub fn badge_label(self) -> &'static str {
        match self {
            StatusTone::Idle => "Idle",
            StatusTone::Busy => "Recording",
            StatusTone::Info => "Info",
            StatusTone::Warning => "Warning",
            StatusTone::Error => "Error",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatusEvent {
    /// Blank the status line.
    Cleared,
    StartedRecording { label: String },
    Recording { label: String },
    Recorded { label: String, count: usize },
    Detected { label: String },
    NoDetection,
    ModelTrained,
    TrainingFailed { reason: String },
}

impl StatusEvent {
    pub fn tone(&self) -> StatusTone {
        match self {
            StatusEvent::Cleared | StatusEvent::NoDetection => StatusTone::Idle,
            StatusEvent::StartedRecording { .. }
            | StatusEvent::Recording { .. }
            | StatusEvent::Recorded { .. } => StatusTone::Busy,
            StatusEvent::Detected { .. } | StatusEvent::ModelTrained => StatusTone::Info,
            StatusEvent::TrainingFailed { .. } => StatusTone::Error,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Cleared | StatusEvent::NoDetection => Ok(()),
            StatusEvent::StartedRecording { label } => {
                write!(f, "Started recording {label}. Collecting data...")
            }
            StatusEvent::Recording { label } => write!(f, "Recording {label}"),
            StatusEvent::Recorded { label, count } => write!(f, "Recorded {label} #{count}"),
            StatusEvent::Detected { label } => write!(f, "Detected: {label}"),
            StatusEvent::ModelTrained => f.write_str("Model trained!"),
            StatusEvent::TrainingFailed { reason } => write!(f, "Training failed: {reason}"),
        }
    }
}

/// Optional sender for status events; a disconnected receiver is ignored.
#[derive(Clone, Debug, Default)]
pub struct StatusSink {
    tx: Option<Sender<StatusEvent>>,
}

impl StatusSink {
    pub fn channel() -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: StatusEvent) {
        tracing::debug!("status: {event}");
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
