//! Scratch-directory housekeeping for saved attachments.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Delete a file, logging instead of failing. Missing files are ignored.
pub fn remove_file_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "deleted scratch file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete scratch file"),
    }
}

/// Remove every regular file directly inside `dir`.
///
/// Returns the number of files removed. A missing directory counts as empty.
pub fn sweep_scratch_dir(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to list scratch directory");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete scratch file"),
        }
    }

    if removed > 0 {
        debug!(dir = %dir.display(), removed, "swept scratch directory");
    }
    removed
}
