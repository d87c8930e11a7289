// Path resolution: turns the user's file/folder arguments into a flat
// list of files to upload.

use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of resolving the input paths. `missing` holds the inputs that
/// do not exist (made absolute for reporting); they are skipped, never fatal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Resolution {
    pub files: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

/// Expand `paths` into files. Files are kept as given; directories are
/// walked recursively and contribute every non-directory descendant in
/// walk order. Per-input results are concatenated in input order.
pub fn resolve<P: AsRef<Path>>(paths: &[P]) -> Resolution {
    let mut resolution = Resolution::default();

    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            resolution.missing.push(absolute(path));
            continue;
        }
        if path.is_dir() {
            resolution.files.extend(walk_dir(path));
        } else {
            resolution.files.push(path.to_path_buf());
        }
    }

    resolution
}

fn walk_dir(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// Absolute form of `path` without resolving symlinks. Falls back to the
/// path as given if the working directory is unavailable.
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
