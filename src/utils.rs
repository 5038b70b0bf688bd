use color_eyre::config::HookBuilder;
use color_eyre::eyre::eyre;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub fn get_config_dir() -> color_eyre::Result<PathBuf> {
    ProjectDirs::from("app", "aurachat", "aurachat")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| eyre!("failed to resolve config directory"))
}

pub fn initialize_panic_handler() -> color_eyre::Result<()> {
    HookBuilder::default().install()
}

// Locks are never held across awaits or observer calls, so a poisoned
// mutex still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
