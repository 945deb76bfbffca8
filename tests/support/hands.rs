use std::path::Path;

use handsign::pose::{HandDetection, Keypoint};

const FINGERTIPS: [&str; 5] = [
    "thumb_tip",
    "index_finger_tip",
    "middle_finger_tip",
    "ring_finger_tip",
    "pinky_finger_tip",
];

/// Open palm: fingertips fanned out far from the wrist.
pub fn open_hand(jitter: f32) -> HandDetection {
    fan(120.0 + jitter, 0.45)
}

/// Fist: fingertips bunched close to the wrist.
pub fn fist(jitter: f32) -> HandDetection {
    fan(35.0 + jitter, 0.12)
}

/// Open palm with the middle fingertip (the default pivot) out of view.
pub fn open_hand_missing_middle(jitter: f32) -> HandDetection {
    let mut hand = open_hand(jitter);
    hand.keypoints
        .retain(|keypoint| keypoint.name != "middle_finger_tip");
    hand
}

fn fan(reach: f32, spread: f32) -> HandDetection {
    let mut keypoints = vec![Keypoint::new("wrist", 200.0, 300.0)];
    for (idx, name) in FINGERTIPS.iter().enumerate() {
        let angle = -std::f32::consts::FRAC_PI_2 + (idx as f32 - 2.0) * spread;
        let length = reach * if idx == 0 { 0.7 } else { 1.0 };
        keypoints.push(Keypoint::new(
            *name,
            200.0 + angle.cos() * length,
            300.0 + angle.sin() * length,
        ));
    }
    HandDetection::new(keypoints)
}

pub fn write_detections(path: &Path, frames: &[Vec<HandDetection>]) {
    let lines: Vec<String> = frames
        .iter()
        .map(|hands| serde_json::to_string(hands).expect("serialize frame"))
        .collect();
    std::fs::write(path, lines.join("\n")).expect("write detections");
}
