use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads each explicit file in order, then the usual `.env` lookup.  Variables that are already
/// set are never overridden, and files that don't exist are skipped.  Returns the files loaded.
pub fn load_env_files(explicit: &[PathBuf]) -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    for path in explicit {
        if load_env_file(path) {
            loaded.push(path.clone());
        }
    }

    // NB: searches the working directory and its parents
    if let Ok(path) = dotenvy::dotenv() {
        if !loaded.contains(&path) {
            loaded.push(path);
        }
    }

    loaded
}

fn load_env_file(path: &Path) -> bool {
    if !path.is_file() {
        debug!(path = %path.display(), "env file not found, skipping");
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not load env file");
            false
        }
    }
}
