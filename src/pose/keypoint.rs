use serde::{Deserialize, Serialize};

use super::geometry::Point;

/// A named 2D keypoint reported by the hand detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Detector confidence, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "score")]
    pub confidence: Option<f32>,
}

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Keypoints without a confidence value always pass.
    pub fn passes(&self, min_confidence: f32) -> bool {
        self.confidence.is_none_or(|confidence| confidence >= min_confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand: its keypoints plus optional detector metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandDetection {
    pub keypoints: Vec<Keypoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
}

impl HandDetection {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            score: None,
            handedness: None,
        }
    }

    /// First keypoint with `name` whose confidence clears `min_confidence`.
    pub fn find(&self, name: &str, min_confidence: f32) -> Option<&Keypoint> {
        find_keypoint(&self.keypoints, name, min_confidence)
    }
}

pub(crate) fn find_keypoint<'a>(
    keypoints: &'a [Keypoint],
    name: &str,
    min_confidence: f32,
) -> Option<&'a Keypoint> {
    keypoints
        .iter()
        .find(|keypoint| keypoint.name == name && keypoint.passes(min_confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_json_with_score_alias() {
        let json = r#"{"keypoints":[{"name":"wrist","x":1.0,"y":2.0,"score":0.8}],"handedness":"left"}"#;
        let detection: HandDetection = serde_json::from_str(json).unwrap();
        assert_eq!(detection.keypoints[0].confidence, Some(0.8));
        assert_eq!(detection.handedness, Some(Handedness::Left));
        assert!(detection.score.is_none());
    }

    #[test]
    fn low_confidence_keypoints_are_skipped() {
        let detection = HandDetection::new(vec![
            Keypoint::new("wrist", 0.0, 0.0).with_confidence(0.1),
            Keypoint::new("wrist", 5.0, 5.0).with_confidence(0.9),
        ]);
        assert_eq!(detection.find("wrist", 0.5).map(|kp| kp.x), Some(5.0));
        assert_eq!(detection.find("wrist", 0.0).map(|kp| kp.x), Some(0.0));
        assert!(detection.find("thumb_tip", 0.0).is_none());
    }
}
