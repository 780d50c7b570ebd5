//! Case-insensitive interned names.
//!
//! Every identifier the compiler creates (classes, functions, properties,
//! labels, enum tags) is interned into a [`NameTable`]. Lookups ignore ASCII
//! case; the first spelling seen becomes the canonical one, so `Foo` and
//! `FOO` resolve to the same [`Name`] and print as whichever came first.
//!
//! # Hash Computation
//!
//! Buckets are keyed by XXHash64 of the lower-cased bytes, mixed with a
//! domain constant so names never collide with other hashed identities.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

/// Domain marker for name hashes.
const NAME_SEED: u64 = 0x1a095090689d4647;

/// Longest identifier the table accepts.
pub const NAME_SIZE: usize = 1024;

/// An interned name.
///
/// Equality and hashing use the table index only, so names from the same
/// table compare in constant time regardless of spelling.
#[derive(Clone)]
pub struct Name {
    index: u32,
    text: Arc<str>,
}

impl Name {
    /// The reserved `None` name (index 0).
    pub fn none() -> Self {
        Self { index: 0, text: Arc::from("None") }
    }

    /// Table index, as written into bytecode.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Canonical spelling.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether this is the reserved `None` name.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.index == 0
    }

    /// Case-insensitive comparison against raw text.
    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        self.text.eq_ignore_ascii_case(text)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Name {}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.text, self.index)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Process-wide name table.
#[derive(Debug)]
pub struct NameTable {
    entries: Vec<Arc<str>>,
    buckets: FxHashMap<u64, Vec<u32>>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    /// Create a table holding only `None`.
    pub fn new() -> Self {
        let mut table = Self {
            entries: Vec::new(),
            buckets: FxHashMap::default(),
        };
        table.intern("None");
        table
    }

    fn key(text: &str) -> u64 {
        xxh64(text.to_ascii_lowercase().as_bytes(), NAME_SEED)
    }

    /// Intern `text`, returning the existing name if one matches ignoring case.
    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(found) = self.find(text) {
            return found;
        }
        let index = self.entries.len() as u32;
        let stored: Arc<str> = Arc::from(text);
        self.entries.push(stored.clone());
        self.buckets.entry(Self::key(text)).or_default().push(index);
        Name { index, text: stored }
    }

    /// Look up a name without creating it.
    pub fn find(&self, text: &str) -> Option<Name> {
        let bucket = self.buckets.get(&Self::key(text))?;
        bucket.iter().find_map(|&index| {
            let stored = &self.entries[index as usize];
            stored
                .eq_ignore_ascii_case(text)
                .then(|| Name { index, text: stored.clone() })
        })
    }

    /// Resolve a bytecode name index.
    pub fn get(&self, index: u32) -> Option<Name> {
        self.entries
            .get(index as usize)
            .map(|text| Name { index, text: text.clone() })
    }

    /// Number of interned names, including `None`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: `None` is present from construction.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_index_zero() {
        let mut table = NameTable::new();
        assert!(table.intern("none").is_none());
        assert_eq!(table.intern("NONE"), Name::none());
    }

    #[test]
    fn intern_is_case_insensitive() {
        let mut table = NameTable::new();
        let first = table.intern("PlayerController");
        let second = table.intern("playercontroller");
        assert_eq!(first, second);
        assert_eq!(second.as_str(), "PlayerController");
    }

    #[test]
    fn distinct_names_get_distinct_indices() {
        let mut table = NameTable::new();
        let a = table.intern("Health");
        let b = table.intern("Armor");
        assert_ne!(a, b);
        assert_eq!(table.get(b.index()), Some(b));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn find_does_not_create() {
        let table = NameTable::new();
        assert!(table.find("Missing").is_none());
        assert_eq!(table.len(), 1);
    }
}
