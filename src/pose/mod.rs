//! Hand keypoints, the connection topology and the features derived from them.

pub mod features;
pub mod geometry;
pub mod keypoint;
pub mod topology;

pub use features::{FeatureExtractor, FeatureVector, extract_features};
pub use geometry::{Point, angle_between, distance};
pub use keypoint::{HandDetection, Handedness, Keypoint};
pub use topology::{Connection, DEFAULT_CONNECTIONS, DEFAULT_PIVOT, Topology};
