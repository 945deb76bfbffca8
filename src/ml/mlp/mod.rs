//! Small feed-forward classifier for gesture feature vectors.

mod model;
mod train;

pub use model::{BatchNorm, DenseLayer, HiddenBlock, MODEL_VERSION, MlpModel, argmax, softmax};
pub use train::{TrainOptions, TrainReport, TrainSet, train_mlp};
