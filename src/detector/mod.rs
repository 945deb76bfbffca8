//! Seams for the external hand-pose detector and the frames it consumes.
//!
//! Both the recording sampler and the inference loop call into the same
//! [`SharedCapture`], which serializes access so a detector backend never sees
//! two concurrent calls.

mod replay;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use crate::pose::HandDetection;

pub use replay::{BlankFrames, ReplayDetector};

/// Video frame handed to the detector.
pub type Frame = image::RgbImage;

/// Errors reported by detector backends and detection replays.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The backend failed to run on a frame.
    #[error("Hand detector failed: {0}")]
    Backend(String),
    /// Failed to read a detections file.
    #[error("Failed to read detections from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A detections file line was not a JSON array of hands.
    #[error("Invalid detections at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// External capability: estimate zero or more hands in a frame.
pub trait HandDetector: Send {
    fn estimate_hands(&mut self, frame: &Frame) -> Result<Vec<HandDetection>, DetectorError>;
}

/// Source of the most recent video frame, if one is available.
pub trait FrameSource: Send {
    fn latest_frame(&mut self) -> Option<Frame>;
}

struct Capture {
    frames: Box<dyn FrameSource>,
    detector: Box<dyn HandDetector>,
}

/// Cloneable handle pairing a frame source with a detector behind one lock.
#[derive(Clone)]
pub struct SharedCapture {
    inner: Arc<Mutex<Capture>>,
}

impl SharedCapture {
    pub fn new(frames: impl FrameSource + 'static, detector: impl HandDetector + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Capture {
                frames: Box::new(frames),
                detector: Box::new(detector),
            })),
        }
    }

    /// Run the detector on the latest frame.
    ///
    /// Returns `Ok(None)` when the source has no frame yet. Blocks for as long
    /// as the detector takes.
    pub fn detect(&self) -> Result<Option<Vec<HandDetection>>, DetectorError> {
        let mut capture = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        let Some(frame) = capture.frames.latest_frame() else {
            return Ok(None);
        };
        capture.detector.estimate_hands(&frame).map(Some)
    }
}

impl std::fmt::Debug for SharedCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCapture").finish_non_exhaustive()
    }
}
