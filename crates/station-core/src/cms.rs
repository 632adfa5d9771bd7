//! CMS REST client.
//!
//! Thin wrapper over the headless CMS collection endpoints: every operation
//! builds a query string, fetches one page, and parses the
//! `{ data, meta.pagination }` envelope. Failures are logged and propagated;
//! there is no retry. Detail-by-slug lookups return `Ok(None)` when the slug
//! is unknown.

use crate::config::CmsConfig;
use crate::error::{Result, StationError};
use crate::model::{
    AboutPage, Artist, Collection, Episode, NewsItem, Page, Show, TagKind,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::error;

/// CMS query-string builder (`populate`, `sort`, `pagination[..]`,
/// `filters[..][$op]`).
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn populate_all(self) -> Self {
        self.param("populate", "*")
    }

    pub fn sort(self, order: &str) -> Self {
        self.param("sort", order)
    }

    pub fn paginate(self, page: u32, page_size: u32) -> Self {
        self.param("pagination[page]", page.to_string())
            .param("pagination[pageSize]", page_size.to_string())
    }

    pub fn filter_eq(self, field: &str, value: &str) -> Self {
        self.param(format!("filters[{field}][$eq]"), value)
    }

    /// Equality filter on a field of a related record.
    pub fn filter_relation_eq(self, relation: &str, field: &str, value: &str) -> Self {
        self.param(format!("filters[{relation}][{field}][$eq]"), value)
    }

    pub fn filter_gte(self, field: &str, value: &str) -> Self {
        self.param(format!("filters[{field}][$gte]"), value)
    }

    pub fn filter_lte(self, field: &str, value: &str) -> Self {
        self.param(format!("filters[{field}][$lte]"), value)
    }

    /// `filters[<field>][id][$in][<n>]=<id>` membership filter.
    pub fn filter_id_in(mut self, field: &str, ids: &[u64]) -> Self {
        for (index, id) in ids.iter().enumerate() {
            self.params.push((
                format!("filters[{field}][id][$in][{index}]"),
                id.to_string(),
            ));
        }
        self
    }

    /// `filters[$or][<n>]...[$containsi]=<text>` case-insensitive substring
    /// match across several fields. Nested relation fields use `a.b` paths.
    pub fn filter_or_contains(mut self, fields: &[&str], text: &str) -> Self {
        for (index, field) in fields.iter().enumerate() {
            let path: String = field
                .split('.')
                .map(|part| format!("[{part}]"))
                .collect();
            self.params
                .push((format!("filters[$or][{index}]{path}[$containsi]"), text.to_string()));
        }
        self
    }

    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.params
    }
}

#[derive(Debug, Clone)]
pub struct CmsClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    page_size: u32,
    catalog_page_size: u32,
}

impl CmsClient {
    pub fn new(config: &CmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            page_size: config.page_size,
            catalog_page_size: config.catalog_page_size,
        }
    }

    pub fn default_page_size(&self) -> u32 {
        self.page_size
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Collection<T>> {
        let url = format!("{}/api/{}", self.base_url, collection);

        let mut request = self.http.get(&url).query(query.as_pairs());
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("CMS error response from {}: {}", url, body);
            return Err(StationError::Http {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }

    // ── Episodes ──────────────────────────────────────────────────────────────

    pub async fn episodes(&self, page: u32, page_size: u32) -> Result<Page<Episode>> {
        let query = Query::new()
            .populate_all()
            .sort("BroadcastDateTime:desc")
            .paginate(page, page_size);
        Ok(self.get_collection("episodes", &query).await?.into())
    }

    pub async fn episode_by_slug(&self, slug: &str) -> Result<Option<Episode>> {
        let query = Query::new()
            .filter_eq("EpisodeSlug", slug)
            .param("populate[link_episode_to_show][populate][0]", "Main_Host")
            .param("populate[link_episode_to_show][populate][1]", "ShowImage")
            .param("populate[guest_artists][populate][0]", "ArtistImage")
            .param("populate[EpisodeImage]", "true")
            .param("populate[Tracklist]", "true")
            .param("populate[tag_genres]", "true")
            .param("populate[tag_mood_vibes]", "true")
            .param("populate[tag_themes]", "true");
        let collection: Collection<Episode> = self.get_collection("episodes", &query).await?;
        Ok(collection.data.into_iter().next())
    }

    pub async fn staff_picks(&self) -> Result<Vec<Episode>> {
        let query = Query::new()
            .filter_eq("StaffPick", "true")
            .populate_all()
            .sort("BroadcastDateTime:desc")
            .paginate(1, 12);
        let collection: Collection<Episode> = self.get_collection("episodes", &query).await?;
        Ok(collection.data)
    }

    pub async fn episodes_by_tag(&self, kind: TagKind, value: &str) -> Result<Vec<Episode>> {
        let query = Query::new()
            .filter_relation_eq(kind.relation(), kind.value_field(), value)
            .populate_all()
            .sort("BroadcastDateTime:desc");
        let collection: Collection<Episode> = self.get_collection("episodes", &query).await?;
        Ok(collection.data)
    }

    /// Archived episodes whose broadcast falls on `date`, earliest first.
    /// Source for past-day schedules.
    pub async fn episodes_on_date(&self, date: NaiveDate) -> Result<Vec<Episode>> {
        let query = Query::new()
            .filter_gte("BroadcastDateTime", &format!("{date}T00:00:00.000Z"))
            .filter_lte("BroadcastDateTime", &format!("{date}T23:59:59.999Z"))
            .populate_all()
            .sort("BroadcastDateTime:asc");
        let collection: Collection<Episode> = self.get_collection("episodes", &query).await?;
        Ok(collection.data)
    }

    // ── Shows ─────────────────────────────────────────────────────────────────

    pub async fn shows(&self, page: u32, page_size: u32) -> Result<Page<Show>> {
        let query = Query::new()
            .populate_all()
            .sort("ShowName:asc")
            .paginate(page, page_size);
        Ok(self.get_collection("shows", &query).await?.into())
    }

    /// The full show catalog in one page, capped at the configured ceiling.
    pub async fn all_shows(&self) -> Result<Vec<Show>> {
        let query = Query::new()
            .populate_all()
            .sort("ShowName:asc")
            .paginate(1, self.catalog_page_size);
        let collection: Collection<Show> = self.get_collection("shows", &query).await?;
        Ok(collection.data)
    }

    pub async fn show_by_slug(&self, slug: &str) -> Result<Option<Show>> {
        let query = Query::new()
            .filter_eq("ShowSlug", slug)
            .param("populate[Main_Host][populate][0]", "ArtistImage")
            .param("populate[ShowImage]", "true")
            .param("populate[Show_Episodes][populate][0]", "EpisodeImage")
            .param("populate[Show_Episodes][sort][0]", "BroadcastDateTime:desc");
        let collection: Collection<Show> = self.get_collection("shows", &query).await?;
        Ok(collection.data.into_iter().next())
    }

    // ── Artists ───────────────────────────────────────────────────────────────

    pub async fn artists(&self, page: u32, page_size: u32) -> Result<Page<Artist>> {
        let query = Query::new()
            .populate_all()
            .sort("ArtistName:asc")
            .paginate(page, page_size);
        Ok(self.get_collection("artists", &query).await?.into())
    }

    pub async fn artist_by_slug(&self, slug: &str) -> Result<Option<Artist>> {
        let query = Query::new()
            .filter_eq("Artist_Slug", slug)
            .param("populate[ArtistImage]", "true")
            .param("populate[Main_host][populate][0]", "ShowImage")
            .param("populate[episodes_guest_featured][populate][0]", "EpisodeImage")
            .param("populate[tag_locations]", "true")
            .param("populate[blogs_written]", "true");
        let collection: Collection<Artist> = self.get_collection("artists", &query).await?;
        Ok(collection.data.into_iter().next())
    }

    // ── News ──────────────────────────────────────────────────────────────────

    pub async fn news(&self, page: u32, page_size: u32) -> Result<Page<NewsItem>> {
        let query = Query::new()
            .populate_all()
            .sort("createdAt:desc")
            .paginate(page, page_size);
        Ok(self.get_collection("blogs", &query).await?.into())
    }

    pub async fn news_by_slug(&self, slug: &str) -> Result<Option<NewsItem>> {
        let query = Query::new()
            .filter_eq("News_Slug", slug)
            .populate_all();
        let collection: Collection<NewsItem> = self.get_collection("blogs", &query).await?;
        Ok(collection.data.into_iter().next())
    }

    // ── About page ────────────────────────────────────────────────────────────

    /// Static about-page content. Tried as a single-type endpoint first;
    /// a 404 there falls back to the one-record collection form that older
    /// CMS installs use. `Ok(None)` when neither has content.
    pub async fn about_page(&self) -> Result<Option<AboutPage>> {
        let url = format!("{}/api/about-page", self.base_url);
        let mut request = self.http.get(&url).query(&[("populate", "*")]);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            let single: SingleEnvelope<AboutPage> = response.json().await?;
            return Ok(single.data);
        }
        if status.as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            error!("CMS error response from {}: {}", url, body);
            return Err(StationError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let query = Query::new()
            .populate_all()
            .sort("publishedAt:desc")
            .paginate(1, 1);
        let collection: Collection<AboutPage> =
            self.get_collection("about-pages", &query).await?;
        Ok(collection.data.into_iter().next())
    }

    // ── Tags ──────────────────────────────────────────────────────────────────

    /// All tags of one kind as `{ id, value }` pairs for the filter UI.
    pub async fn tags(&self, kind: TagKind) -> Result<Vec<TagEntry>> {
        let query = Query::new()
            .sort(&format!("{}:asc", kind.value_field()))
            .paginate(1, self.catalog_page_size);
        let collection: Collection<serde_json::Value> =
            self.get_collection(kind.collection(), &query).await?;
        Ok(collection
            .data
            .into_iter()
            .filter_map(|raw| {
                let id = raw.get("id")?.as_u64()?;
                let value = raw.get(kind.value_field())?.as_str()?.to_string();
                Some(TagEntry { id, value })
            })
            .collect())
    }

    /// Raw search query against one collection. Used by the search module,
    /// which owns filter construction and relevance ranking.
    pub async fn search_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Collection<T>> {
        self.get_collection(collection, query).await
    }
}

/// Single-type response envelope: `{ data, meta }` with `data` an object
/// (or null for unpublished content) instead of an array.
#[derive(Debug, serde::Deserialize)]
struct SingleEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TagEntry {
    pub id: u64,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(query: &Query) -> Vec<(&str, &str)> {
        query
            .as_pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_query_pagination_and_sort() {
        let query = Query::new()
            .populate_all()
            .sort("BroadcastDateTime:desc")
            .paginate(2, 10);
        assert_eq!(
            pairs(&query),
            vec![
                ("populate", "*"),
                ("sort", "BroadcastDateTime:desc"),
                ("pagination[page]", "2"),
                ("pagination[pageSize]", "10"),
            ]
        );
    }

    #[test]
    fn test_query_slug_filter() {
        let query = Query::new().filter_eq("EpisodeSlug", "late-night-dub-12");
        assert_eq!(
            pairs(&query),
            vec![("filters[EpisodeSlug][$eq]", "late-night-dub-12")]
        );
    }

    #[test]
    fn test_query_or_contains_nested_path() {
        let query = Query::new().filter_or_contains(
            &[
                "EpisodeTitle",
                "EpisodeDescription",
                "link_episode_to_show.ShowName",
            ],
            "dub",
        );
        assert_eq!(
            pairs(&query),
            vec![
                ("filters[$or][0][EpisodeTitle][$containsi]", "dub"),
                ("filters[$or][1][EpisodeDescription][$containsi]", "dub"),
                (
                    "filters[$or][2][link_episode_to_show][ShowName][$containsi]",
                    "dub"
                ),
            ]
        );
    }

    #[test]
    fn test_query_id_membership() {
        let query = Query::new().filter_id_in("tag_genres", &[4, 9]);
        assert_eq!(
            pairs(&query),
            vec![
                ("filters[tag_genres][id][$in][0]", "4"),
                ("filters[tag_genres][id][$in][1]", "9"),
            ]
        );
    }
}
