//! Archive inventory.
//!
//! The inventory is built from the archive client's verbose listing and maps
//! each member name to its size and modification time. It is read once per
//! run and shared read-only afterwards.
//!
//! - [`parser`]: turns listing lines into [`Entry`] values
//! - [`dirs`]: finds directories that must be requested explicitly

pub mod dirs;
pub mod parser;

pub use dirs::empty_dirs;
pub use parser::{parse_line, read_listing};

use std::collections::BTreeMap;
use time::OffsetDateTime;

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path inside the archive; directories end with `/`
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub modified_at: OffsetDateTime,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        is_directory(&self.name)
    }
}

/// Whether an archive member name denotes a directory.
pub fn is_directory(name: &str) -> bool {
    name.ends_with('/')
}

/// Archive members keyed by name.
///
/// Iteration is in name order, which keeps partitioning deterministic for a
/// given listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    entries: BTreeMap<String, Entry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any previous entry with the same name.
    pub fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Non-directory entries.
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| !e.is_directory())
    }

    /// Directory entries.
    pub fn directories(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| e.is_directory())
    }

    /// Whether `name` is present here with the same size and timestamp.
    pub fn is_unchanged(&self, name: &str, size: u64, modified_at: OffsetDateTime) -> bool {
        self.get(name)
            .is_some_and(|prev| prev.size == size && prev.modified_at == modified_at)
    }
}

impl FromIterator<Entry> for Inventory {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut inventory = Self::new();
        for entry in iter {
            inventory.insert(entry);
        }
        inventory
    }
}
