use std::path::Path;

use super::{DetectorError, Frame, FrameSource, HandDetector};
use crate::pose::HandDetection;

/// Replays pre-recorded detections, one frame per call.
///
/// The file format is JSON lines: each non-blank line holds the array of hands
/// detected in one frame. Once exhausted the detector reports no hands, unless
/// it was set to loop.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: Vec<Vec<HandDetection>>,
    cursor: usize,
    looping: bool,
}

impl ReplayDetector {
    pub fn from_frames(frames: Vec<Vec<HandDetection>>) -> Self {
        Self {
            frames,
            cursor: 0,
            looping: false,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DetectorError> {
        let text = std::fs::read_to_string(path).map_err(|source| DetectorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut frames = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let hands: Vec<HandDetection> =
                serde_json::from_str(line).map_err(|source| DetectorError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    source,
                })?;
            frames.push(hands);
        }
        tracing::debug!("Loaded {} replay frames from {}", frames.len(), path.display());
        Ok(Self::from_frames(frames))
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }

    pub fn next_frame(&mut self) -> Vec<HandDetection> {
        if self.frames.is_empty() {
            return Vec::new();
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Vec::new();
            }
            self.cursor = 0;
        }
        let hands = self.frames[self.cursor].clone();
        self.cursor += 1;
        hands
    }
}

impl HandDetector for ReplayDetector {
    fn estimate_hands(&mut self, _frame: &Frame) -> Result<Vec<HandDetection>, DetectorError> {
        Ok(self.next_frame())
    }
}

/// Frame source that always yields a blank frame of fixed size.
#[derive(Debug, Clone, Copy)]
pub struct BlankFrames {
    width: u32,
    height: u32,
}

impl BlankFrames {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for BlankFrames {
    fn latest_frame(&mut self) -> Option<Frame> {
        Some(Frame::new(self.width, self.height))
    }
}
