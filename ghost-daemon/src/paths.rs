use std::path::{Path, PathBuf};
use std::time::Duration;

pub use ghost_core::settings::{ghost_root, settings_path_at};

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_ENGINE: &str = "podman";
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound for `git clone` and the site listing CLI.
pub const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(300);

pub const CLONES_DIR: &str = "clones";

pub fn clones_dir(home: &Path) -> PathBuf {
    ghost_root(home).join(CLONES_DIR)
}
