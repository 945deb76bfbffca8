//! Library exports for the binaries, benchmarks and tests.
/// Application directories under the config root.
pub mod app_dirs;
/// Trained model plus the topology and labels it was trained on.
pub mod classifier;
/// Time sources for recording deadlines.
pub mod clock;
/// TOML settings.
pub mod config;
/// Labeled feature vectors and their snapshots.
pub mod dataset;
/// Hand detector and frame source seams.
pub mod detector;
/// Live classification loop.
pub mod inference;
/// Tracing setup.
pub mod logging;
/// Classifier training and metrics.
pub mod ml;
/// Model persistence.
pub mod model_store;
/// Keypoints, topology and feature extraction.
pub mod pose;
/// Timed sample recording.
pub mod recording;
/// Session wiring for the trigger surface and background loops.
pub mod session;
/// Status line events.
pub mod status;
/// Shared dataset, model and extractor.
pub mod store;
/// Dataset to model training.
pub mod training;
/// Periodic background threads.
pub mod worker;
