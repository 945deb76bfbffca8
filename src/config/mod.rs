//! TOML settings stored as `config.toml` in the app directory.

mod defaults;
mod errors;
mod io;
mod types;

pub use errors::ConfigError;
pub use io::{CONFIG_FILE_NAME, config_path, load_from, load_or_default, save, save_to_path};
pub use types::{
    AppSettings, InferenceSettings, ModelSettings, RecordingSettings, TopologySettings,
    TrainingSettings,
};
