use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

use handsign::app_dirs::CONFIG_HOME_ENV;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct HandsignEnvGuard {
    previous: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl HandsignEnvGuard {
    pub fn set_config_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = std::env::var(CONFIG_HOME_ENV).ok();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME_ENV, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for HandsignEnvGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            Some(value) => unsafe { std::env::set_var(CONFIG_HOME_ENV, value) },
            // SAFETY: as above.
            None => unsafe { std::env::remove_var(CONFIG_HOME_ENV) },
        }
    }
}
