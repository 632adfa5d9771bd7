//! Filtered search across episodes, shows and artists.
//!
//! One CMS query per selected content type, executed concurrently. Text
//! matching happens server-side (case-insensitive substring filters), so
//! pagination counts stay truthful; relevance scoring of the returned rows
//! happens here. The merged result list is sorted by score, descending,
//! with ties left in fetch order.

use crate::cms::{CmsClient, Query};
use crate::error::Result;
use crate::model::{rich_text_to_plain, Artist, Collection, Episode, Show};
use chrono::{DateTime, Utc};
use futures_util::future::{try_join_all, BoxFuture};
use serde::{Deserialize, Serialize};

// Relevance weights. Additive, no normalization against field or query length.
const WEIGHT_TITLE: u32 = 10;
const WEIGHT_SECONDARY: u32 = 5;
const WEIGHT_RELATED_NAME: u32 = 8;
const WEIGHT_TAG: u32 = 3;
const WEIGHT_DATE_RANGE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Episodes,
    Shows,
    Artists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub query: String,
    #[serde(default = "all_content_types")]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
    #[serde(default)]
    pub mood_ids: Vec<u64>,
    #[serde(default)]
    pub theme_ids: Vec<u64>,
    #[serde(default)]
    pub location_ids: Vec<u64>,
}

fn all_content_types() -> Vec<ContentType> {
    vec![ContentType::Episodes, ContentType::Shows, ContentType::Artists]
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: String::new(),
            content_types: all_content_types(),
            date_from: None,
            date_to: None,
            genre_ids: Vec::new(),
            mood_ids: Vec::new(),
            theme_ids: Vec::new(),
            location_ids: Vec::new(),
        }
    }
}

impl SearchFilters {
    fn wants(&self, content_type: ContentType) -> bool {
        self.content_types.contains(&content_type)
    }

    fn trimmed_query(&self) -> Option<&str> {
        let q = self.query.trim();
        (!q.is_empty()).then_some(q)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SearchHit {
    Episode(Episode),
    Show(Show),
    Artist(Artist),
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResultItem {
    pub score: u32,
    #[serde(flatten)]
    pub hit: SearchHit,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub items: Vec<SearchResultItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

// ── Relevance scoring ─────────────────────────────────────────────────────────

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn tag_matches(selected: &[u64], present: impl Iterator<Item = u64>) -> u32 {
    if selected.is_empty() {
        return 0;
    }
    let present: Vec<u64> = present.collect();
    selected.iter().filter(|id| present.contains(id)).count() as u32
}

pub fn episode_relevance(episode: &Episode, filters: &SearchFilters) -> u32 {
    let mut score = 0;

    if let Some(query) = filters.trimmed_query() {
        let query = query.to_lowercase();
        if contains_ci(&episode.title, &query) {
            score += WEIGHT_TITLE;
        }
        if episode
            .description
            .as_deref()
            .is_some_and(|d| contains_ci(d, &query))
        {
            score += WEIGHT_SECONDARY;
        }
        if episode
            .show
            .as_ref()
            .is_some_and(|s| contains_ci(&s.name, &query))
        {
            score += WEIGHT_RELATED_NAME;
        }
    }

    score += WEIGHT_TAG * tag_matches(&filters.genre_ids, episode.tag_genres.iter().map(|t| t.id));
    score += WEIGHT_TAG * tag_matches(&filters.mood_ids, episode.tag_moods.iter().map(|t| t.id));
    score += WEIGHT_TAG * tag_matches(&filters.theme_ids, episode.tag_themes.iter().map(|t| t.id));

    if filters.date_from.is_some() || filters.date_to.is_some() {
        let after = filters.date_from.map_or(true, |from| episode.broadcast >= from);
        let before = filters.date_to.map_or(true, |to| episode.broadcast <= to);
        if after && before {
            score += WEIGHT_DATE_RANGE;
        }
    }

    score
}

pub fn show_relevance(show: &Show, filters: &SearchFilters) -> u32 {
    let mut score = 0;

    if let Some(query) = filters.trimmed_query() {
        let query = query.to_lowercase();
        if contains_ci(&show.name, &query) {
            score += WEIGHT_TITLE;
        }
        if show
            .description
            .as_ref()
            .is_some_and(|d| contains_ci(&rich_text_to_plain(d), &query))
        {
            score += WEIGHT_SECONDARY;
        }
    }

    score
}

pub fn artist_relevance(artist: &Artist, filters: &SearchFilters) -> u32 {
    let mut score = 0;

    if let Some(query) = filters.trimmed_query() {
        let query = query.to_lowercase();
        if contains_ci(&artist.name, &query) {
            score += WEIGHT_TITLE;
        }
        if artist.bio.as_deref().is_some_and(|b| contains_ci(b, &query)) {
            score += WEIGHT_SECONDARY;
        }
    }

    score += WEIGHT_TAG
        * tag_matches(
            &filters.location_ids,
            artist.tag_locations.iter().map(|t| t.id),
        );

    score
}

// ── Query construction (server-side filtering) ────────────────────────────────

fn episode_query(filters: &SearchFilters, page: u32, page_size: u32) -> Query {
    let mut query = Query::new()
        .populate_all()
        .sort("BroadcastDateTime:desc")
        .paginate(page, page_size);

    if let Some(text) = filters.trimmed_query() {
        query = query.filter_or_contains(
            &[
                "EpisodeTitle",
                "EpisodeDescription",
                "link_episode_to_show.ShowName",
            ],
            text,
        );
    }
    if let Some(from) = filters.date_from {
        query = query.filter_gte("BroadcastDateTime", &from.to_rfc3339());
    }
    if let Some(to) = filters.date_to {
        query = query.filter_lte("BroadcastDateTime", &to.to_rfc3339());
    }
    query = query.filter_id_in("tag_genres", &filters.genre_ids);
    query = query.filter_id_in("tag_mood_vibes", &filters.mood_ids);
    query = query.filter_id_in("tag_themes", &filters.theme_ids);
    query
}

fn show_query(filters: &SearchFilters, page: u32, page_size: u32) -> Query {
    let mut query = Query::new()
        .populate_all()
        .sort("ShowName:asc")
        .paginate(page, page_size);
    if let Some(text) = filters.trimmed_query() {
        query = query.filter_or_contains(&["ShowName", "ShowDescription"], text);
    }
    query
}

fn artist_query(filters: &SearchFilters, page: u32, page_size: u32) -> Query {
    let mut query = Query::new()
        .populate_all()
        .sort("ArtistName:asc")
        .paginate(page, page_size);
    if let Some(text) = filters.trimmed_query() {
        query = query.filter_or_contains(&["ArtistName", "ArtistBio"], text);
    }
    query = query.filter_id_in("tag_locations", &filters.location_ids);
    query
}

// ── Execution ─────────────────────────────────────────────────────────────────

struct TypeResult {
    items: Vec<SearchResultItem>,
    total: u64,
    has_more: bool,
}

/// Merge per-type pages: concatenate, stable-sort by score descending,
/// aggregate totals. `has_more` is true while any type has further pages.
fn combine(results: Vec<TypeResult>, page: u32, page_size: u32) -> SearchResults {
    let total = results.iter().map(|r| r.total).sum();
    let has_more = results.iter().any(|r| r.has_more);

    let mut items: Vec<SearchResultItem> =
        results.into_iter().flat_map(|r| r.items).collect();
    items.sort_by(|a, b| b.score.cmp(&a.score));

    SearchResults {
        items,
        total,
        page,
        page_size,
        has_more,
    }
}

pub struct SearchService {
    cms: CmsClient,
}

impl SearchService {
    pub fn new(cms: CmsClient) -> Self {
        Self { cms }
    }

    /// One shared page number advances across all selected content types in
    /// lockstep; an exhausted type returns an empty page and stops
    /// contributing to `has_more`.
    pub async fn search(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResults> {
        let mut tasks: Vec<BoxFuture<'_, Result<TypeResult>>> = Vec::new();

        if filters.wants(ContentType::Episodes) {
            tasks.push(Box::pin(self.search_episodes(filters, page, page_size)));
        }
        if filters.wants(ContentType::Shows) {
            tasks.push(Box::pin(self.search_shows(filters, page, page_size)));
        }
        if filters.wants(ContentType::Artists) {
            tasks.push(Box::pin(self.search_artists(filters, page, page_size)));
        }

        let results = try_join_all(tasks).await?;
        Ok(combine(results, page, page_size))
    }

    async fn search_episodes(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<TypeResult> {
        let query = episode_query(filters, page, page_size);
        let collection: Collection<Episode> =
            self.cms.search_collection("episodes", &query).await?;
        let pagination = &collection.meta.pagination;
        Ok(TypeResult {
            total: pagination.total,
            has_more: pagination.page < pagination.page_count,
            items: collection
                .data
                .into_iter()
                .map(|episode| SearchResultItem {
                    score: episode_relevance(&episode, filters),
                    hit: SearchHit::Episode(episode),
                })
                .collect(),
        })
    }

    async fn search_shows(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<TypeResult> {
        let query = show_query(filters, page, page_size);
        let collection: Collection<Show> = self.cms.search_collection("shows", &query).await?;
        let pagination = &collection.meta.pagination;
        Ok(TypeResult {
            total: pagination.total,
            has_more: pagination.page < pagination.page_count,
            items: collection
                .data
                .into_iter()
                .map(|show| SearchResultItem {
                    score: show_relevance(&show, filters),
                    hit: SearchHit::Show(show),
                })
                .collect(),
        })
    }

    async fn search_artists(
        &self,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<TypeResult> {
        let query = artist_query(filters, page, page_size);
        let collection: Collection<Artist> =
            self.cms.search_collection("artists", &query).await?;
        let pagination = &collection.meta.pagination;
        Ok(TypeResult {
            total: pagination.total,
            has_more: pagination.page < pagination.page_count,
            items: collection
                .data
                .into_iter()
                .map(|artist| SearchResultItem {
                    score: artist_relevance(&artist, filters),
                    hit: SearchHit::Artist(artist),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(json: serde_json::Value) -> Episode {
        serde_json::from_value(json).unwrap()
    }

    fn filters(query: &str) -> SearchFilters {
        SearchFilters {
            query: query.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_episode_title_and_show_weights_stack() {
        let ep = episode(serde_json::json!({
            "id": 1,
            "EpisodeTitle": "Dub Session 04",
            "EpisodeSlug": "dub-session-04",
            "EpisodeDescription": "two hours of dub",
            "BroadcastDateTime": "2026-03-14T19:00:00Z",
            "link_episode_to_show": {"id": 2, "ShowName": "Dub Corner", "ShowSlug": "dub-corner"}
        }));
        // title 10 + description 5 + show name 8
        assert_eq!(episode_relevance(&ep, &filters("dub")), 23);
    }

    #[test]
    fn test_episode_tag_and_date_weights() {
        let ep = episode(serde_json::json!({
            "id": 1,
            "EpisodeTitle": "Session",
            "EpisodeSlug": "session",
            "BroadcastDateTime": "2026-03-14T19:00:00Z",
            "tag_genres": [{"id": 4, "Genre": "Techno"}, {"id": 9, "Genre": "House"}]
        }));
        let mut f = filters("");
        f.genre_ids = vec![4, 9, 11];
        f.date_from = Some("2026-03-01T00:00:00Z".parse().unwrap());
        f.date_to = Some("2026-03-31T00:00:00Z".parse().unwrap());
        // two tag matches at 3 each + in-range 2
        assert_eq!(episode_relevance(&ep, &f), 8);
    }

    #[test]
    fn test_out_of_range_episode_gets_no_date_weight() {
        let ep = episode(serde_json::json!({
            "id": 1,
            "EpisodeTitle": "Session",
            "EpisodeSlug": "session",
            "BroadcastDateTime": "2026-05-14T19:00:00Z",
        }));
        let mut f = filters("");
        f.date_to = Some("2026-03-31T00:00:00Z".parse().unwrap());
        assert_eq!(episode_relevance(&ep, &f), 0);
    }

    #[test]
    fn test_artist_location_weight() {
        let artist: Artist = serde_json::from_value(serde_json::json!({
            "id": 3,
            "ArtistName": "Selector A",
            "Artist_Slug": "selector-a",
            "ArtistBio": "spins records",
            "tag_locations": [{"id": 7, "Location": "London"}]
        }))
        .unwrap();
        let mut f = filters("records");
        f.location_ids = vec![7];
        // bio 5 + location 3
        assert_eq!(artist_relevance(&artist, &f), 8);
    }

    #[test]
    fn test_combine_sorts_by_score_and_keeps_tie_order() {
        let make = |score: u32, id: u64| SearchResultItem {
            score,
            hit: SearchHit::Show(
                serde_json::from_value(serde_json::json!({
                    "id": id, "ShowName": "x", "ShowSlug": "x"
                }))
                .unwrap(),
            ),
        };
        let results = vec![
            TypeResult {
                items: vec![make(5, 1), make(10, 2)],
                total: 2,
                has_more: false,
            },
            TypeResult {
                items: vec![make(5, 3)],
                total: 1,
                has_more: true,
            },
        ];
        let combined = combine(results, 1, 10);
        let ids: Vec<u64> = combined
            .items
            .iter()
            .map(|item| match &item.hit {
                SearchHit::Show(show) => show.id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, vec![2, 1, 3]); // tie between 1 and 3 keeps fetch order
        assert_eq!(combined.total, 3);
        assert!(combined.has_more);
    }

    #[test]
    fn test_query_builders_only_filter_when_asked() {
        let empty = filters("   ");
        let q = episode_query(&empty, 1, 10);
        assert!(q
            .as_pairs()
            .iter()
            .all(|(k, _)| !k.starts_with("filters[$or]")));

        let q = episode_query(&filters("night"), 1, 10);
        assert!(q
            .as_pairs()
            .iter()
            .any(|(k, v)| k.starts_with("filters[$or][0]") && v == "night"));
    }
}
