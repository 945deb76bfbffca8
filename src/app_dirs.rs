//! Application directories anchored to a single `.handsign` folder.
//!
//! Config, logs, trained models and dataset snapshots all live under the OS
//! config directory unless `HANDSIGN_CONFIG_HOME` (or the in-process override
//! used by tests) points somewhere else.

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory under the config root.
pub const APP_DIR_NAME: &str = ".handsign";
/// Environment variable that relocates the config root.
pub const CONFIG_HOME_ENV: &str = "HANDSIGN_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing application directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// No base config directory could be resolved.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    /// Failed to create a directory.
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Root `.handsign` directory, created if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("logs"))
}

/// Directory holding persisted classifier artifacts.
pub fn models_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("models"))
}

/// Directory holding recorded dataset snapshots.
pub fn datasets_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("datasets"))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Ok(path) = std::env::var(CONFIG_HOME_ENV) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Points the config root at a test directory until dropped.
#[cfg(test)]
pub(crate) struct ConfigBaseGuard {
    _serial: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
static OVERRIDE_SERIAL: Mutex<()> = Mutex::new(());

#[cfg(test)]
impl ConfigBaseGuard {
    pub(crate) fn set(path: PathBuf) -> Self {
        let serial = OVERRIDE_SERIAL
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        *CONFIG_BASE_OVERRIDE
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = Some(path);
        Self { _serial: serial }
    }
}

#[cfg(test)]
impl Drop for ConfigBaseGuard {
    fn drop(&mut self) {
        *CONFIG_BASE_OVERRIDE
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn uses_override_for_root_dir() {
        let base = tempdir().unwrap();
        let _guard = ConfigBaseGuard::set(base.path().to_path_buf());
        let root = app_root_dir().unwrap();
        assert_eq!(root, base.path().join(APP_DIR_NAME));
        assert!(root.is_dir());
    }

    #[test]
    fn subdirectories_live_under_root() {
        let base = tempdir().unwrap();
        let _guard = ConfigBaseGuard::set(base.path().to_path_buf());
        let root = base.path().join(APP_DIR_NAME);
        assert_eq!(models_dir().unwrap(), root.join("models"));
        assert_eq!(datasets_dir().unwrap(), root.join("datasets"));
        assert!(logs_dir().unwrap().is_dir());
    }
}
