use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

pub type Trigram = [char; 3];

/// Character trigrams of a lowercased, space-padded string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrigramSet {
    grams: HashSet<Trigram>,
}

impl TrigramSet {
    /// Number of distinct trigrams.
    pub fn len(&self) -> usize {
        self.grams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grams.is_empty()
    }

    pub fn contains(&self, gram: &Trigram) -> bool {
        self.grams.contains(gram)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigram> {
        self.grams.iter()
    }
}

/// Builds the trigram set of `text` after lowercasing, trimming and padding it
/// with two spaces on each side.
pub fn trigrams(text: &str) -> TrigramSet {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return TrigramSet::default();
    }
    let padded: Vec<char> = "  "
        .chars()
        .chain(normalized.chars())
        .chain("  ".chars())
        .collect();
    let grams = padded
        .windows(3)
        .map(|window| [window[0], window[1], window[2]])
        .collect();
    TrigramSet { grams }
}

/// Dice coefficient `2|A∩B| / (|A|+|B|)`; zero when either side is empty.
pub fn similarity(a: &TrigramSet, b: &TrigramSet) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let shared = small.iter().filter(|gram| large.contains(gram)).count();
    (2 * shared) as f32 / (a.len() + b.len()) as f32
}

/// Write-once cache of trigram sets keyed by lowercased text.
///
/// Entries are never evicted: the catalog is static and small.
#[derive(Debug, Default)]
pub struct TrigramCache {
    sets: RwLock<HashMap<String, Arc<TrigramSet>>>,
}

impl TrigramCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached set for `key`, computing it from `source` on first use.
    pub fn get_or_insert_with<F>(&self, key: &str, source: F) -> Arc<TrigramSet>
    where
        F: FnOnce() -> String,
    {
        if let Some(set) = self.sets.read().get(key) {
            return Arc::clone(set);
        }
        let mut guard = self.sets.write();
        let set = guard.entry(key.to_string()).or_insert_with(|| {
            debug!(key, "Caching trigram set");
            Arc::new(trigrams(&source()))
        });
        Arc::clone(set)
    }

    /// Number of distinct texts cached so far.
    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.read().is_empty()
    }
}
