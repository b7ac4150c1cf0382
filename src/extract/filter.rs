//! Handling of names passed to, and lines read from, the extraction client.

use crate::report::EXIT_ERROR;

/// Characters the client treats as pattern syntax in member arguments.
pub const GLOB_CHARS: [char; 6] = ['*', '?', '[', ']', '{', '}'];

/// Suffix of the line printed when an existing file is newer than the archived one.
pub const NOT_OLDER: &str = "File on disk is not older; skipping.";

/// Suffix of the line printed when a file is already present and kept.
pub const ALREADY_EXISTS: &str = ": Already exists";

/// Escape pattern characters so the client matches `name` literally.
pub fn escape_globs(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if GLOB_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// What to do with a line from the client's diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Existing file is not older; dropped
    NotOlder,
    /// File already exists; dropped
    AlreadyExists,
    /// The client will exit with an error; recorded, not forwarded
    DeferredError,
    /// Anything else; forwarded as is
    Other,
}

impl LineKind {
    pub fn classify(line: &str) -> Self {
        if line.ends_with(NOT_OLDER) {
            Self::NotOlder
        } else if line.ends_with(ALREADY_EXISTS) {
            Self::AlreadyExists
        } else if line == EXIT_ERROR {
            Self::DeferredError
        } else {
            Self::Other
        }
    }
}
