//! Empty directory reconciliation.
//!
//! Extracting a file recreates its parent directories, but a directory
//! holding no extracted file is only recreated when requested by name.
//! Requesting the deepest such directory is enough, since its ancestors come
//! with it.

use std::collections::BTreeSet;

/// Directories from `dirs` that need to be requested explicitly.
///
/// A directory is dropped when it is the immediate parent of one of `files`,
/// or an ancestor of any directory in `dirs`. The result is sorted.
pub fn empty_dirs<'a, F, D>(files: F, dirs: D) -> Vec<String>
where
    F: IntoIterator<Item = &'a str>,
    D: IntoIterator<Item = &'a str>,
{
    let dirs: Vec<&str> = dirs.into_iter().collect();
    let mut candidates: BTreeSet<&str> = dirs.iter().copied().collect();

    for file in files {
        candidates.remove(parent_dir(file));
    }

    for &dir in &dirs {
        for ancestor in ancestors(dir) {
            candidates.remove(ancestor);
        }
    }

    candidates.into_iter().map(str::to_string).collect()
}

/// Parent directory of a file name, with a trailing slash.
///
/// Top level names have `./` as their parent, which never matches an
/// archive directory entry.
fn parent_dir(file: &str) -> &str {
    match file.rfind('/') {
        Some(idx) => &file[..=idx],
        None => "./",
    }
}

/// Every proper ancestor of a directory name, shallowest first.
fn ancestors(dir: &str) -> impl Iterator<Item = &str> {
    let trimmed = dir.strip_suffix('/').unwrap_or(dir);
    trimmed.match_indices('/').map(move |(idx, _)| &dir[..=idx])
}
