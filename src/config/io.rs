use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::ConfigError;
use super::types::AppSettings;
use crate::app_dirs::{self, AppDirError};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app directory, returning defaults if the file is missing.
pub fn load_or_default() -> Result<AppSettings, ConfigError> {
    load_from(&config_path()?)
}

/// Load and normalize settings from `path`; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<AppSettings, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppSettings::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(AppSettings::normalized)
}

pub fn save(settings: &AppSettings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Write settings atomically, creating parent directories as needed.
pub fn save_to_path(settings: &AppSettings, path: &Path) -> Result<(), ConfigError> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data.as_bytes()).map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

fn map_app_dir_error(error: AppDirError) -> ConfigError {
    match error {
        AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
