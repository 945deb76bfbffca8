use crate::pose::{DEFAULT_CONNECTIONS, DEFAULT_PIVOT, Connection};

pub(super) const MIN_DURATION_MS: u64 = 100;
pub(super) const MAX_DURATION_MS: u64 = 10 * 60 * 1000;
pub(super) const MIN_SAMPLE_INTERVAL_MS: u64 = 10;
pub(super) const MAX_INTERVAL_MS: u64 = 10_000;

pub(super) fn default_duration_ms() -> u64 {
    5_000
}

pub(super) fn default_sample_interval_ms() -> u64 {
    200
}

pub(super) fn default_dataset_name() -> String {
    "gestures".to_string()
}

pub(super) fn default_frame_interval_ms() -> u64 {
    16
}

pub(super) fn default_false() -> bool {
    false
}

pub(super) fn default_hidden_sizes() -> Vec<usize> {
    vec![128, 64]
}

pub(super) fn default_epochs() -> usize {
    30
}

pub(super) fn default_batch_size() -> usize {
    16
}

pub(super) fn default_learning_rate() -> f32 {
    0.001
}

pub(super) fn default_l2_penalty() -> f32 {
    0.01
}

pub(super) fn default_dropout() -> f32 {
    0.3
}

pub(super) fn default_validation_split() -> f32 {
    0.1
}

pub(super) fn default_patience() -> usize {
    5
}

pub(super) fn default_seed() -> u64 {
    42
}

pub(super) fn default_connections() -> Vec<Connection> {
    DEFAULT_CONNECTIONS.iter().copied().map(Connection::from).collect()
}

pub(super) fn default_pivot() -> String {
    DEFAULT_PIVOT.to_string()
}

pub(super) fn default_model_key() -> String {
    crate::model_store::MODEL_KEY.to_string()
}

/// Names usable as a single file stem under the app directory.
pub(super) fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
