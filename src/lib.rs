pub mod catalog;
pub mod layout;
pub mod session;
pub mod trigram;
#[cfg(feature = "web")]
pub mod web;

pub use catalog::{Catalog, CatalogError, Category, DEFAULT_COLOR, MenuEntry, category_color};
pub use session::{Clock, HIGHLIGHT_DURATION, ManualClock, SearchSession, SystemClock};
pub use trigram::{TrigramCache, TrigramSet, similarity, trigrams};

use layout::{latin_to_ru, ru_to_latin};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Tunables for [`MenuSearch::rank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results returned.
    pub limit: usize,
    /// Minimum trigram similarity for a fuzzy match.
    pub threshold: f32,
    /// Queries up to this many characters use substring matching only.
    pub short_query_len: usize,
    /// Capacity of the ranked-result cache; 0 disables it.
    pub result_cache: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 8,
            threshold: 0.2,
            short_query_len: 2,
            result_cache: 256,
        }
    }
}

/// A ranked entry. `score` is `None` for short queries, which are not scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry<'a> {
    pub entry: &'a MenuEntry,
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
struct RankedHit {
    index: usize,
    score: Option<f32>,
}

/// Search service over a static catalog.
///
/// Owns the catalog together with the trigram caches derived from it, so
/// several independent services can coexist in one process.
pub struct MenuSearch {
    catalog: Catalog,
    config: SearchConfig,
    raw_trigrams: TrigramCache,
    latin_trigrams: TrigramCache,
    results: Option<Mutex<LruCache<String, Arc<[RankedHit]>>>>,
}

impl MenuSearch {
    /// Service over `catalog` with [`SearchConfig::default`].
    pub fn new(catalog: Catalog) -> Self {
        Self::with_config(catalog, SearchConfig::default())
    }

    /// Service over `catalog` with explicit tunables.
    pub fn with_config(catalog: Catalog, config: SearchConfig) -> Self {
        let results = NonZeroUsize::new(config.result_cache).map(|cap| Mutex::new(LruCache::new(cap)));
        Self {
            catalog,
            config,
            raw_trigrams: TrigramCache::new(),
            latin_trigrams: TrigramCache::new(),
            results,
        }
    }

    /// Service over the compiled-in catalog.
    pub fn builtin() -> Self {
        Self::new(Catalog::builtin().clone())
    }

    /// The catalog being searched.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Tunables in effect for this service.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Display color token for a category key.
    pub fn category_color(&self, category_key: &str) -> &'static str {
        category_color(category_key)
    }

    /// Returns at most `limit` entries matching `query`, best first.
    pub fn rank(&self, query: &str) -> Vec<&MenuEntry> {
        self.rank_scored(query)
            .into_iter()
            .map(|hit| hit.entry)
            .collect()
    }

    /// Same ordering as [`rank`](Self::rank), with the score each entry matched at.
    pub fn rank_scored(&self, query: &str) -> Vec<ScoredEntry<'_>> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() || self.catalog.is_empty() {
            return Vec::new();
        }
        self.cached_hits(&normalized)
            .iter()
            .map(|hit| ScoredEntry {
                entry: &self.catalog.entries()[hit.index],
                score: hit.score,
            })
            .collect()
    }

    fn cached_hits(&self, normalized: &str) -> Arc<[RankedHit]> {
        let Some(cache) = &self.results else {
            return self.compute_hits(normalized).into();
        };
        if let Some(hits) = cache.lock().get(normalized) {
            debug!(query = normalized, "Result cache hit");
            return Arc::clone(hits);
        }
        let hits: Arc<[RankedHit]> = self.compute_hits(normalized).into();
        cache.lock().put(normalized.to_string(), Arc::clone(&hits));
        hits
    }

    fn compute_hits(&self, query: &str) -> Vec<RankedHit> {
        if query.chars().count() <= self.config.short_query_len {
            self.short_query_hits(query)
        } else {
            self.trigram_hits(query)
        }
    }

    /// Substring matching in the typed layout and in the other one.
    fn short_query_hits(&self, query: &str) -> Vec<RankedHit> {
        let query_latin = ru_to_latin(query);
        let query_ru = latin_to_ru(query);
        let check_ru = query_ru != query;

        self.catalog
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                let text = entry.text.to_lowercase();
                let text_latin = ru_to_latin(&text).to_lowercase();
                text.contains(query)
                    || text_latin.contains(query)
                    || (check_ru && text.contains(&query_ru))
                    || text_latin.contains(&query_latin)
            })
            .take(self.config.limit)
            .map(|(index, _)| RankedHit { index, score: None })
            .collect()
    }

    fn trigram_hits(&self, query: &str) -> Vec<RankedHit> {
        let query_raw = trigrams(query);
        let query_latin = trigrams(&ru_to_latin(query));
        let query_ru = trigrams(&latin_to_ru(query));

        let mut hits: Vec<RankedHit> = Vec::new();
        for (index, entry) in self.catalog.entries().iter().enumerate() {
            let text = entry.text.to_lowercase();
            if text.contains(query) {
                hits.push(RankedHit {
                    index,
                    score: Some(1.0),
                });
                continue;
            }

            let text_raw = self.raw_trigrams.get_or_insert_with(&text, || text.clone());
            let text_latin = self
                .latin_trigrams
                .get_or_insert_with(&text, || ru_to_latin(&text));

            let score = similarity(&query_raw, &text_raw)
                .max(similarity(&query_latin, &text_latin))
                .max(similarity(&query_ru, &text_latin));
            if score >= self.config.threshold {
                hits.push(RankedHit {
                    index,
                    score: Some(score),
                });
            }
        }

        // Stable, so equal scores keep catalog order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(self.config.limit);
        hits
    }
}

impl Default for MenuSearch {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(entries: &[&MenuEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    fn small_catalog() -> Catalog {
        let make = |id: &str, text: &str| MenuEntry {
            id: id.to_string(),
            text: text.to_string(),
            category: "Типография".to_string(),
            category_key: "typography".to_string(),
            link: None,
        };
        Catalog::new(vec![
            make("a", "Печать фото"),
            make("b", "Ламинирование документов"),
            make("c", "Печать визиток"),
        ])
        .unwrap()
    }

    #[test]
    fn blank_queries_return_nothing() {
        let search = MenuSearch::builtin();
        assert!(search.rank("").is_empty());
        assert!(search.rank("   ").is_empty());
    }

    #[test]
    fn empty_catalog_returns_nothing() {
        let search = MenuSearch::new(Catalog::default());
        assert!(search.rank("печать").is_empty());
        assert!(search.rank("п").is_empty());
    }

    #[test]
    fn substring_match_scores_one() {
        let search = MenuSearch::builtin();
        let hits = search.rank_scored("ВИЗИТ");
        assert_eq!(hits[0].entry.id, "t6");
        assert_eq!(hits[0].score, Some(1.0));
    }

    #[test]
    fn short_queries_keep_catalog_order_and_are_unscored() {
        let search = MenuSearch::new(small_catalog());
        let hits = search.rank_scored("пе");
        assert_eq!(
            hits.iter().map(|h| h.entry.id.as_str()).collect::<Vec<_>>(),
            ["a", "c"]
        );
        assert!(hits.iter().all(|h| h.score.is_none()));
    }

    #[test]
    fn short_query_typed_in_latin_layout() {
        let search = MenuSearch::new(small_catalog());
        // "gt" is "пе" typed with the Latin layout active.
        assert_eq!(ids(&search.rank("gt")), ["a", "c"]);
    }

    #[test]
    fn long_query_typed_in_latin_layout() {
        let search = MenuSearch::new(small_catalog());
        let hits = search.rank("gtxfnm");
        let found = ids(&hits);
        assert!(found.contains(&"a".to_string()));
        assert!(found.contains(&"c".to_string()));
        assert!(!found.contains(&"b".to_string()));
    }

    #[test]
    fn misspelled_query_still_matches() {
        let search = MenuSearch::builtin();
        let hits = search.rank_scored("ламинерование");
        assert!(!hits.is_empty());
        let top = hits[0];
        assert!(top.entry.text.to_lowercase().contains("ламинирование"));
        assert!(top.score.unwrap() < 1.0);
    }

    #[test]
    fn substring_matches_outrank_fuzzy_ones() {
        let search = MenuSearch::builtin();
        let hits = search.rank_scored("гравировка");
        let first_fuzzy = hits.iter().position(|h| h.score < Some(1.0));
        if let Some(pos) = first_fuzzy {
            assert!(hits[pos..].iter().all(|h| h.score < Some(1.0)));
        }
        assert!(hits[0].entry.text.to_lowercase().contains("гравировка"));
    }

    #[test]
    fn results_are_capped() {
        let search = MenuSearch::builtin();
        for query in ["а", "е", "печать", "ghbdtn", "!!!", "Печать на"] {
            assert!(search.rank(query).len() <= 8, "{query}");
        }
        assert_eq!(search.rank("а").len(), 8);
    }

    #[test]
    fn custom_limit_and_threshold() {
        let config = SearchConfig {
            limit: 2,
            threshold: 0.9,
            ..SearchConfig::default()
        };
        let search = MenuSearch::with_config(Catalog::builtin().clone(), config);
        assert_eq!(search.rank("п").len(), 2);
        assert!(search.rank("ламинерование").is_empty());
    }

    #[test]
    fn cached_and_uncached_rankings_agree() {
        let cached = MenuSearch::builtin();
        let uncached = MenuSearch::with_config(
            Catalog::builtin().clone(),
            SearchConfig {
                result_cache: 0,
                ..SearchConfig::default()
            },
        );
        for query in ["печать", "gtxfnm", "т", "гравировка на", "фото"] {
            let first = ids(&cached.rank(query));
            assert_eq!(first, ids(&cached.rank(query)));
            assert_eq!(first, ids(&uncached.rank(query)));
        }
    }

    #[test]
    fn trigram_caches_are_filled_lazily() {
        let search = MenuSearch::new(small_catalog());
        assert!(search.raw_trigrams.is_empty());
        search.rank("ламинат");
        assert_eq!(search.raw_trigrams.len(), 3);
        assert_eq!(search.latin_trigrams.len(), 3);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"threshold":0.3}"#).unwrap();
        assert_eq!(config.threshold, 0.3);
        assert_eq!(config.limit, 8);
    }
}
