//! Settings persistence behind a trait so handlers never touch paths.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use ghost_core::{settings, CoreError, Settings};

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, CoreError>;

    /// Load, apply `f`, save. Returns the saved settings.
    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> Result<Settings, CoreError>;
}

/// `config.yaml` under a home directory.
#[derive(Debug)]
pub struct FileSettingsStore {
    home: PathBuf,
    write: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            write: Mutex::new(()),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings, CoreError> {
        settings::load_at(&self.home)
    }

    fn update(&self, f: &mut dyn FnMut(&mut Settings)) -> Result<Settings, CoreError> {
        // Serialize read-modify-write cycles within this process.
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        settings::update_at(&self.home, |s| f(s))
    }
}
