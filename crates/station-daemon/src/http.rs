//! HTTP API gateway.
//!
//! Serves content browsing, the schedule, search, player control and the
//! guest chat identity on one axum router. Upstream failures map to 502
//! with a generic body; an absent slug is a plain 404; a day with nothing
//! scheduled is a 404 with a distinct body so clients can tell it apart
//! from an unknown route.

use crate::core::DaemonEvent;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use station_core::chat::ChatClient;
use station_core::cms::{CmsClient, TagEntry};
use station_core::model::{AboutPage, Artist, Episode, NewsItem, Page, Show, TagKind};
use station_core::protocol::{Command, PlayerState};
use station_core::schedule::{Schedule, ScheduleService};
use station_core::search::{ContentType, SearchFilters, SearchResults, SearchService};
use station_core::state::StateManager;
use station_core::StationError;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct HttpState {
    pub state_manager: Arc<StateManager>,
    pub event_tx: mpsc::Sender<DaemonEvent>,
    pub cms: CmsClient,
    pub schedule: Arc<ScheduleService>,
    pub search: Arc<SearchService>,
    pub chat: ChatClient,
}

type ApiError = (StatusCode, Json<Value>);

fn upstream_error(err: StationError) -> ApiError {
    error!("upstream request failed: {}", err);
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "upstream unavailable" })),
    )
}

fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

pub fn start_server(state: HttpState, bind_address: String, port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/api/episodes", get(list_episodes))
            .route("/api/episodes/staff-picks", get(staff_picks))
            .route("/api/episodes/:slug", get(episode_by_slug))
            .route("/api/shows", get(list_shows))
            .route("/api/shows/:slug", get(show_by_slug))
            .route("/api/artists", get(list_artists))
            .route("/api/artists/:slug", get(artist_by_slug))
            .route("/api/news", get(list_news))
            .route("/api/news/:slug", get(news_by_slug))
            .route("/api/about", get(about_page))
            .route("/api/tags/:kind", get(list_tags))
            .route("/api/schedule", get(schedule_range))
            .route("/api/schedule/:date", get(schedule_for_date))
            .route("/api/search", get(search))
            .route("/api/player/state", get(player_state))
            .route("/api/player/play", post(play_live))
            .route("/api/player/play-episode", post(play_episode))
            .route("/api/player/stop", post(stop))
            .route("/api/player/volume/:percent", post(set_volume))
            .route("/api/chat/identity", get(chat_identity).put(update_chat_identity))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

// ── Content browsing ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListParams {
    page: Option<u32>,
    page_size: Option<u32>,
    /// Tag filter, only meaningful on the episode list.
    kind: Option<TagKind>,
    tag: Option<String>,
}

impl ListParams {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn page_size(&self, default: u32) -> u32 {
        self.page_size.unwrap_or(default).clamp(1, 100)
    }
}

async fn list_episodes(
    State(state): State<HttpState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Episode>>, ApiError> {
    if let (Some(kind), Some(tag)) = (params.kind, params.tag.as_deref()) {
        let items = state
            .cms
            .episodes_by_tag(kind, tag)
            .await
            .map_err(upstream_error)?;
        let total = items.len() as u64;
        return Ok(Json(Page {
            items,
            total,
            has_more: false,
        }));
    }

    let page = state
        .cms
        .episodes(params.page(), params.page_size(state.cms.default_page_size()))
        .await
        .map_err(upstream_error)?;
    Ok(Json(page))
}

async fn staff_picks(
    State(state): State<HttpState>,
) -> Result<Json<Vec<Episode>>, ApiError> {
    let picks = state.cms.staff_picks().await.map_err(upstream_error)?;
    Ok(Json(picks))
}

async fn episode_by_slug(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Episode>, ApiError> {
    state
        .cms
        .episode_by_slug(&slug)
        .await
        .map_err(upstream_error)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn list_shows(
    State(state): State<HttpState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Show>>, ApiError> {
    let page = state
        .cms
        .shows(params.page(), params.page_size(state.cms.default_page_size()))
        .await
        .map_err(upstream_error)?;
    Ok(Json(page))
}

async fn show_by_slug(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Show>, ApiError> {
    state
        .cms
        .show_by_slug(&slug)
        .await
        .map_err(upstream_error)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn list_artists(
    State(state): State<HttpState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Artist>>, ApiError> {
    let page = state
        .cms
        .artists(params.page(), params.page_size(state.cms.default_page_size()))
        .await
        .map_err(upstream_error)?;
    Ok(Json(page))
}

async fn artist_by_slug(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<Artist>, ApiError> {
    state
        .cms
        .artist_by_slug(&slug)
        .await
        .map_err(upstream_error)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn list_news(
    State(state): State<HttpState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<NewsItem>>, ApiError> {
    let page = state
        .cms
        .news(params.page(), params.page_size(state.cms.default_page_size()))
        .await
        .map_err(upstream_error)?;
    Ok(Json(page))
}

async fn news_by_slug(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
) -> Result<Json<NewsItem>, ApiError> {
    state
        .cms
        .news_by_slug(&slug)
        .await
        .map_err(upstream_error)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn about_page(
    State(state): State<HttpState>,
) -> Result<Json<AboutPage>, ApiError> {
    state
        .cms
        .about_page()
        .await
        .map_err(upstream_error)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn list_tags(
    State(state): State<HttpState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<TagEntry>>, ApiError> {
    let kind: TagKind = kind.parse().map_err(|_| not_found())?;
    let tags = state.cms.tags(kind).await.map_err(upstream_error)?;
    Ok(Json(tags))
}

// ── Schedule ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RangeParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

async fn schedule_for_date(
    State(state): State<HttpState>,
    Path(date): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let date: NaiveDate = date.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid date, expected YYYY-MM-DD" })),
        )
    })?;

    match state.schedule.schedule_for_date(date).await {
        Ok(Some(schedule)) => Ok(Json(schedule)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "nothing scheduled", "date": date })),
        )),
        Err(err) => Err(upstream_error(err)),
    }
}

async fn schedule_range(
    State(state): State<HttpState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Schedule>>, ApiError> {
    let today = Utc::now().date_naive();
    let from = params.from.unwrap_or(today);
    let to = params.to.unwrap_or(from + Duration::days(6));
    if to < from {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "range end precedes start" })),
        ));
    }

    let schedules = state
        .schedule
        .schedules_for_range(from, to)
        .await
        .map_err(upstream_error)?;
    Ok(Json(schedules))
}

// ── Search ────────────────────────────────────────────────────────────────────

/// Flat query-string form of the search filter state. Multi-valued fields
/// travel as comma-separated lists so the whole filter round-trips through
/// one URL.
#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    types: Option<String>,
    from: Option<chrono::DateTime<Utc>>,
    to: Option<chrono::DateTime<Utc>>,
    genres: Option<String>,
    moods: Option<String>,
    themes: Option<String>,
    locations: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

fn parse_id_list(raw: &Option<String>) -> Vec<u64> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_content_types(raw: &Option<String>) -> Option<Vec<ContentType>> {
    let raw = raw.as_deref()?;
    let parsed: Vec<ContentType> = raw
        .split(',')
        .filter_map(|part| match part.trim() {
            "episodes" => Some(ContentType::Episodes),
            "shows" => Some(ContentType::Shows),
            "artists" => Some(ContentType::Artists),
            _ => None,
        })
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let mut filters = SearchFilters {
        query: params.q.clone(),
        date_from: params.from,
        date_to: params.to,
        genre_ids: parse_id_list(&params.genres),
        mood_ids: parse_id_list(&params.moods),
        theme_ids: parse_id_list(&params.themes),
        location_ids: parse_id_list(&params.locations),
        ..Default::default()
    };
    if let Some(types) = parse_content_types(&params.types) {
        filters.content_types = types;
    }

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(state.cms.default_page_size())
        .clamp(1, 100);

    let results = state
        .search
        .search(&filters, page, page_size)
        .await
        .map_err(upstream_error)?;
    Ok(Json(results))
}

// ── Player control ────────────────────────────────────────────────────────────

async fn player_state(State(state): State<HttpState>) -> Json<PlayerState> {
    Json(state.state_manager.get_state().await)
}

async fn send_command(state: &HttpState, cmd: Command) -> Result<StatusCode, ApiError> {
    if state
        .event_tx
        .send(DaemonEvent::ClientCommand(cmd))
        .await
        .is_err()
    {
        error!("daemon event channel closed");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "daemon unavailable" })),
        ));
    }
    Ok(StatusCode::ACCEPTED)
}

async fn play_live(State(state): State<HttpState>) -> Result<StatusCode, ApiError> {
    send_command(&state, Command::PlayLive).await
}

#[derive(Deserialize)]
struct PlayEpisodeBody {
    slug: String,
}

async fn play_episode(
    State(state): State<HttpState>,
    Json(body): Json<PlayEpisodeBody>,
) -> Result<StatusCode, ApiError> {
    let episode = state
        .cms
        .episode_by_slug(&body.slug)
        .await
        .map_err(upstream_error)?
        .ok_or_else(not_found)?;

    let stream_url = episode.stream_link().ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": "episode has no audio link" })),
    ))?;

    send_command(
        &state,
        Command::PlayEpisode {
            slug: episode.slug.clone(),
            title: episode.title.clone(),
            stream_url: stream_url.to_string(),
        },
    )
    .await
}

async fn stop(State(state): State<HttpState>) -> Result<StatusCode, ApiError> {
    send_command(&state, Command::Stop).await
}

async fn set_volume(
    State(state): State<HttpState>,
    Path(percent): Path<u8>,
) -> Result<StatusCode, ApiError> {
    let value = f32::from(percent.min(100)) / 100.0;
    send_command(&state, Command::Volume { value }).await
}

// ── Chat identity ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct IdentityResponse {
    id: String,
    display_name: Option<String>,
    channel: String,
}

async fn chat_identity(
    State(state): State<HttpState>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let stored = state.state_manager.guest_identity().await;
    let display_name = state.state_manager.display_name().await;

    let identity = state
        .chat
        .connect_or_regenerate(stored, display_name.as_deref().unwrap_or(""))
        .await
        .map_err(upstream_error)?;

    state.chat.join_channel(&identity).await.map_err(upstream_error)?;

    if let Err(e) = state
        .state_manager
        .set_guest_identity(Some(identity.clone()))
        .await
    {
        warn!("failed to persist guest identity: {}", e);
    }

    Ok(Json(IdentityResponse {
        id: identity.id,
        display_name,
        channel: state.chat.channel_id().to_string(),
    }))
}

#[derive(Deserialize)]
struct DisplayNameBody {
    display_name: Option<String>,
}

async fn update_chat_identity(
    State(state): State<HttpState>,
    Json(body): Json<DisplayNameBody>,
) -> Result<Json<IdentityResponse>, ApiError> {
    if let Err(e) = state
        .state_manager
        .set_display_name(body.display_name.clone())
        .await
    {
        warn!("failed to persist display name: {}", e);
    }
    let display_name = state.state_manager.display_name().await;

    // Push the new name to the provider when we already have an identity;
    // otherwise it is picked up on the next connect.
    if let Some(identity) = state.state_manager.guest_identity().await {
        state
            .chat
            .update_display_name(&identity, display_name.as_deref().unwrap_or(""))
            .await
            .map_err(upstream_error)?;
        return Ok(Json(IdentityResponse {
            id: identity.id,
            display_name,
            channel: state.chat.channel_id().to_string(),
        }));
    }

    Ok(Json(IdentityResponse {
        id: String::new(),
        display_name,
        channel: state.chat.channel_id().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list_parsing() {
        assert_eq!(parse_id_list(&Some("1,2, 3".into())), vec![1, 2, 3]);
        assert_eq!(parse_id_list(&Some("1,x,3".into())), vec![1, 3]);
        assert!(parse_id_list(&None).is_empty());
    }

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(
            parse_content_types(&Some("episodes,artists".into())),
            Some(vec![ContentType::Episodes, ContentType::Artists])
        );
        // Unknown-only lists fall back to the default set.
        assert_eq!(parse_content_types(&Some("podcasts".into())), None);
        assert_eq!(parse_content_types(&None), None);
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListParams {
            page: Some(0),
            page_size: Some(500),
            kind: None,
            tag: None,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(10), 100);
    }
}
