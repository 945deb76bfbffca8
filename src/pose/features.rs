//! Geometric feature extraction shared by recording and inference.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::geometry::{angle_between, distance};
use super::keypoint::{HandDetection, Keypoint, find_keypoint};
use super::topology::Topology;

/// Ordered features: one distance, plus one angle when the pivot is present,
/// per connection whose endpoints were both detected.
pub type FeatureVector = Vec<f32>;

/// Extract features for `keypoints` in topology order.
///
/// A connection with a missing endpoint contributes nothing. The pivot is
/// resolved once per call, so either every complete connection carries an
/// angle or none does.
pub fn extract_features(
    keypoints: &[Keypoint],
    topology: &Topology,
    min_confidence: f32,
) -> FeatureVector {
    let pivot = topology
        .pivot
        .as_deref()
        .and_then(|name| find_keypoint(keypoints, name, min_confidence))
        .map(Keypoint::position);

    let mut features = Vec::with_capacity(topology.max_feature_len());
    for connection in &topology.connections {
        let start = find_keypoint(keypoints, connection.start(), min_confidence);
        let end = find_keypoint(keypoints, connection.end(), min_confidence);
        let (Some(start), Some(end)) = (start, end) else {
            continue;
        };
        features.push(distance(start.position(), end.position()));
        if let Some(pivot) = pivot {
            features.push(angle_between(pivot, start.position(), end.position()));
        }
    }
    features
}

/// Topology-bound extractor that remembers the length of its latest output.
#[derive(Debug)]
pub struct FeatureExtractor {
    topology: Topology,
    min_confidence: f32,
    current_len: AtomicUsize,
}

impl FeatureExtractor {
    pub fn new(topology: Topology, min_confidence: f32) -> Self {
        Self {
            topology,
            min_confidence,
            current_len: AtomicUsize::new(0),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Length of the most recent vector produced by this extractor (0 before any).
    pub fn current_feature_len(&self) -> usize {
        self.current_len.load(Ordering::Relaxed)
    }

    pub fn extract(&self, keypoints: &[Keypoint]) -> FeatureVector {
        let features = extract_features(keypoints, &self.topology, self.min_confidence);
        self.current_len.store(features.len(), Ordering::Relaxed);
        features
    }

    /// Features of the first detected hand, or an empty vector without one.
    pub fn extract_first(&self, detections: &[HandDetection]) -> FeatureVector {
        detections
            .first()
            .map(|detection| self.extract(&detection.keypoints))
            .unwrap_or_default()
    }

    /// Features for every detected hand, in detection order.
    pub fn extract_all(&self, detections: &[HandDetection]) -> Vec<FeatureVector> {
        detections
            .iter()
            .map(|detection| self.extract(&detection.keypoints))
            .collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Topology::default(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::topology::Connection;

    fn single_connection() -> Topology {
        Topology::new(vec![Connection::new("wrist", "thumb_tip")], None)
    }

    fn full_hand(offset: f32) -> Vec<Keypoint> {
        vec![
            Keypoint::new("wrist", 0.0 + offset, 0.0),
            Keypoint::new("thumb_tip", -30.0 + offset, -40.0),
            Keypoint::new("index_finger_tip", -10.0 + offset, -80.0),
            Keypoint::new("middle_finger_tip", 0.0 + offset, -90.0),
            Keypoint::new("ring_finger_tip", 10.0 + offset, -85.0),
            Keypoint::new("pinky_finger_tip", 25.0 + offset, -70.0),
        ]
    }

    #[test]
    fn single_connection_yields_distance_only() {
        let keypoints = vec![
            Keypoint::new("wrist", 0.0, 0.0),
            Keypoint::new("thumb_tip", 3.0, 4.0),
        ];
        assert_eq!(extract_features(&keypoints, &single_connection(), 0.0), vec![5.0]);
    }

    #[test]
    fn full_hand_with_pivot_fills_every_slot() {
        let topology = Topology::default();
        let features = extract_features(&full_hand(0.0), &topology, 0.0);
        assert_eq!(features.len(), topology.max_feature_len());
        assert!(features.iter().all(|value| value.is_finite()));
        // wrist -> middle tip passes through the pivot: the ray to the pivot itself is zero-length.
        assert_eq!(features[5], 0.0);
    }

    #[test]
    fn missing_pivot_drops_angles() {
        let mut keypoints = full_hand(0.0);
        keypoints.retain(|kp| kp.name != "middle_finger_tip");
        let features = extract_features(&keypoints, &Topology::default(), 0.0);
        // Connections touching the middle tip vanish; the remaining six carry no angle.
        assert_eq!(features.len(), 6);
    }

    #[test]
    fn missing_endpoint_skips_connection_without_placeholder() {
        let topology = Topology::new(
            vec![
                Connection::new("wrist", "thumb_tip"),
                Connection::new("wrist", "ghost"),
                Connection::new("wrist", "index_finger_tip"),
            ],
            None,
        );
        let features = extract_features(&full_hand(0.0), &topology, 0.0);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0], 50.0);
    }

    #[test]
    fn no_keypoints_gives_empty_vector() {
        assert!(extract_features(&[], &Topology::default(), 0.0).is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let keypoints = full_hand(3.25);
        let topology = Topology::default();
        let first = extract_features(&keypoints, &topology, 0.0);
        let second = extract_features(&keypoints, &topology, 0.0);
        let first_bits: Vec<u32> = first.iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn extractor_tracks_latest_length() {
        let extractor = FeatureExtractor::new(single_connection(), 0.0);
        assert_eq!(extractor.current_feature_len(), 0);
        extractor.extract(&full_hand(0.0));
        assert_eq!(extractor.current_feature_len(), 1);
        extractor.extract(&[]);
        assert_eq!(extractor.current_feature_len(), 0);
    }

    #[test]
    fn extract_first_uses_only_the_first_hand() {
        let extractor = FeatureExtractor::new(single_connection(), 0.0);
        let detections = vec![
            HandDetection::new(vec![
                Keypoint::new("wrist", 0.0, 0.0),
                Keypoint::new("thumb_tip", 0.0, 2.0),
            ]),
            HandDetection::new(full_hand(0.0)),
        ];
        assert_eq!(extractor.extract_first(&detections), vec![2.0]);
        assert_eq!(extractor.extract_all(&detections), vec![vec![2.0], vec![50.0]]);
        assert!(extractor.extract_first(&[]).is_empty());
    }
}
