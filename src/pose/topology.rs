//! Fixed keypoint topology that defines feature order.
//!
//! The topology is part of every trained model's identity: changing either the
//! connection list or the pivot invalidates recorded samples and models.

use serde::{Deserialize, Serialize};

/// Keypoint whose presence adds one angle per connection.
pub const DEFAULT_PIVOT: &str = "middle_finger_tip";

/// Wrist to each fingertip, then each pair of adjacent fingertips.
pub const DEFAULT_CONNECTIONS: [(&str, &str); 9] = [
    ("wrist", "thumb_tip"),
    ("wrist", "index_finger_tip"),
    ("wrist", "middle_finger_tip"),
    ("wrist", "ring_finger_tip"),
    ("wrist", "pinky_finger_tip"),
    ("thumb_tip", "index_finger_tip"),
    ("index_finger_tip", "middle_finger_tip"),
    ("middle_finger_tip", "ring_finger_tip"),
    ("ring_finger_tip", "pinky_finger_tip"),
];

/// Ordered `(start, end)` pair of keypoint names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection(pub String, pub String);

impl Connection {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self(start.into(), end.into())
    }

    pub fn start(&self) -> &str {
        &self.0
    }

    pub fn end(&self) -> &str {
        &self.1
    }
}

impl From<(&str, &str)> for Connection {
    fn from((start, end): (&str, &str)) -> Self {
        Self::new(start, end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub connections: Vec<Connection>,
    /// Angles are emitted only when this keypoint is named and detected.
    #[serde(default)]
    pub pivot: Option<String>,
}

impl Topology {
    pub fn new(connections: Vec<Connection>, pivot: Option<String>) -> Self {
        Self { connections, pivot }
    }

    pub fn hand_default() -> Self {
        Self::new(
            DEFAULT_CONNECTIONS.iter().copied().map(Connection::from).collect(),
            Some(DEFAULT_PIVOT.to_string()),
        )
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Feature length when every keypoint, including the pivot, is present.
    pub fn max_feature_len(&self) -> usize {
        let per_connection = if self.pivot.is_some() { 2 } else { 1 };
        self.connections.len() * per_connection
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::hand_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology_covers_nine_connections_with_angles() {
        let topology = Topology::default();
        assert_eq!(topology.len(), 9);
        assert_eq!(topology.max_feature_len(), 18);
        assert_eq!(topology.connections[0], Connection::new("wrist", "thumb_tip"));
    }

    #[test]
    fn connections_serialize_as_pairs() {
        let json = serde_json::to_string(&Connection::new("wrist", "thumb_tip")).unwrap();
        assert_eq!(json, r#"["wrist","thumb_tip"]"#);
    }
}
