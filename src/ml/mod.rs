//! Gesture classifier training and evaluation.

pub mod metrics;
pub mod mlp;
