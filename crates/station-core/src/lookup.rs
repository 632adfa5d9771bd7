//! Show catalog lookup.
//!
//! An in-memory snapshot of the full show catalog, indexed by slug, exact
//! lowercase name and normalized name, with a fuzzy-similarity fallback over
//! show names. The cache wrapper is an explicit injectable object built once
//! per process; invalidation is manual only — shows change rarely enough
//! that a session may serve a stale mapping.

use crate::cms::CmsClient;
use crate::error::Result;
use crate::model::{Show, ShowReference};
use crate::text::normalize_title;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Minimum normalized-Levenshtein similarity for a fuzzy name match.
/// Below this the slot stays unlinked rather than guessing.
pub const FUZZY_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Immutable catalog snapshot.
pub struct ShowCatalog {
    refs: Vec<ShowReference>,
    norm_names: Vec<String>,
    by_slug: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    by_norm: HashMap<String, usize>,
}

impl ShowCatalog {
    pub fn from_shows(shows: &[Show]) -> Self {
        let mut refs = Vec::with_capacity(shows.len());
        let mut norm_names = Vec::with_capacity(shows.len());
        let mut by_slug = HashMap::new();
        let mut by_name = HashMap::new();
        let mut by_norm = HashMap::new();

        for show in shows {
            let index = refs.len();
            let normalized = normalize_title(&show.name);

            by_slug.entry(show.slug.clone()).or_insert(index);
            by_name.entry(show.name.to_lowercase()).or_insert(index);
            by_norm.entry(normalized.clone()).or_insert(index);

            refs.push(show.reference());
            norm_names.push(normalized);
        }

        Self {
            refs,
            norm_names,
            by_slug,
            by_name,
            by_norm,
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn by_slug(&self, slug: &str) -> Option<&ShowReference> {
        self.by_slug.get(slug).map(|&i| &self.refs[i])
    }

    /// Case-insensitive exact name match, then normalized-name match.
    pub fn by_exact_name(&self, name: &str) -> Option<&ShowReference> {
        if let Some(&i) = self.by_name.get(&name.to_lowercase()) {
            return Some(&self.refs[i]);
        }
        self.by_norm
            .get(&normalize_title(name))
            .map(|&i| &self.refs[i])
    }

    /// Best fuzzy match over normalized show names, or `None` when the best
    /// candidate scores below [`FUZZY_SIMILARITY_THRESHOLD`]. Ties keep the
    /// first catalog entry.
    pub fn by_fuzzy_name(&self, title: &str) -> Option<&ShowReference> {
        let needle = normalize_title(title);
        if needle.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, name) in self.norm_names.iter().enumerate() {
            let score = strsim::normalized_levenshtein(&needle, name);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }

        match best {
            Some((index, score)) if score >= FUZZY_SIMILARITY_THRESHOLD => {
                debug!(
                    "fuzzy-matched '{}' to '{}' (similarity {:.2})",
                    title, self.refs[index].name, score
                );
                Some(&self.refs[index])
            }
            _ => None,
        }
    }

    /// Full resolution chain for a free-text title:
    /// exact name, normalized name, fuzzy similarity.
    pub fn resolve_title(&self, title: &str) -> Option<&ShowReference> {
        self.by_exact_name(title).or_else(|| self.by_fuzzy_name(title))
    }
}

/// Build-once catalog cache. Holding it in an owned struct (rather than
/// module-level state) keeps resolution testable with seeded snapshots.
#[derive(Default)]
pub struct ShowCatalogCache {
    inner: RwLock<Option<Arc<ShowCatalog>>>,
}

impl ShowCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot, fetching and building it on first use.
    /// Subsequent calls return the same `Arc` without touching the CMS.
    pub async fn get_or_build(&self, cms: &CmsClient) -> Result<Arc<ShowCatalog>> {
        if let Some(catalog) = self.inner.read().await.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let shows = cms.all_shows().await?;
        let built = Arc::new(ShowCatalog::from_shows(&shows));

        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.as_ref() {
            // lost the build race; keep the first snapshot
            return Ok(Arc::clone(existing));
        }
        *guard = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Manual invalidation. The next `get_or_build` refetches.
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    /// Install a prebuilt snapshot (tests, warm starts).
    pub async fn seed(&self, catalog: ShowCatalog) {
        *self.inner.write().await = Some(Arc::new(catalog));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: u64, name: &str, slug: &str) -> Show {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "ShowName": name,
            "ShowSlug": slug,
        }))
        .unwrap()
    }

    fn catalog() -> ShowCatalog {
        ShowCatalog::from_shows(&[
            show(1, "The Night Shift", "the-night-shift"),
            show(2, "Sister's Show", "sisters-show"),
            show(3, "Daybreak", "daybreak"),
        ])
    }

    #[test]
    fn test_slug_lookup() {
        let c = catalog();
        assert_eq!(c.by_slug("daybreak").unwrap().id, 3);
        assert!(c.by_slug("no-such-show").is_none());
    }

    #[test]
    fn test_exact_name_is_case_insensitive() {
        let c = catalog();
        assert_eq!(c.by_exact_name("the night shift").unwrap().id, 1);
        assert_eq!(c.by_exact_name("THE NIGHT SHIFT").unwrap().id, 1);
    }

    #[test]
    fn test_normalized_name_matches_curly_apostrophe() {
        let c = catalog();
        assert_eq!(c.by_exact_name("Sister\u{2019}s Show").unwrap().id, 2);
    }

    #[test]
    fn test_fuzzy_tolerates_transposition() {
        let c = catalog();
        // one transposed character pair
        assert_eq!(c.by_fuzzy_name("The Nihgt Shift").unwrap().id, 1);
    }

    #[test]
    fn test_fuzzy_rejects_unrelated_title() {
        let c = catalog();
        assert!(c.by_fuzzy_name("Completely Different Programme").is_none());
        assert!(c.by_fuzzy_name("").is_none());
    }

    #[test]
    fn test_resolve_prefers_exact_over_fuzzy() {
        let c = ShowCatalog::from_shows(&[
            show(1, "Daybreak", "daybreak"),
            show(2, "Daybreaks", "daybreaks"),
        ]);
        assert_eq!(c.resolve_title("Daybreaks").unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_cache_is_idempotent_without_clear() {
        let cache = ShowCatalogCache::new();
        cache.seed(catalog()).await;

        // the client points nowhere; a cache hit must not fetch
        let cms = CmsClient::new(&crate::config::CmsConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        });

        let first = cache.get_or_build(&cms).await.unwrap();
        let second = cache.get_or_build(&cms).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.clear().await;
        assert!(cache.inner.read().await.is_none());
    }
}
