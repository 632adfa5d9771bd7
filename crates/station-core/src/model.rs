//! Read-only projections of CMS-owned entities.
//!
//! All of these are externally owned; nothing here is persisted locally.
//! Field renames match the CMS wire JSON exactly, so a struct deserializes
//! straight out of the collection envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Response envelope ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(rename = "pageCount")]
    pub page_count: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub pagination: Pagination,
}

/// The CMS collection envelope: `{ data, meta.pagination{..} }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
    pub meta: Meta,
}

/// Client-facing page, derived from a [`Collection`].
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub has_more: bool,
}

impl<T> From<Collection<T>> for Page<T> {
    fn from(c: Collection<T>) -> Self {
        let has_more = c.meta.pagination.page < c.meta.pagination.page_count;
        Self {
            items: c.data,
            total: c.meta.pagination.total,
            has_more,
        }
    }
}

// ── Media and rich text ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub url: String,
    #[serde(rename = "alternativeText", default)]
    pub alternative_text: Option<String>,
}

/// CMS rich-text bodies are arrays of typed blocks; we keep them opaque and
/// flatten to plain text only where scoring or display needs it.
pub type RichText = serde_json::Value;

/// Flatten a rich-text body to plain text (block `children[].text`, space
/// separated). Plain-string bodies pass through unchanged.
pub fn rich_text_to_plain(value: &RichText) -> String {
    fn walk(value: &RichText, out: &mut Vec<String>) {
        match value {
            serde_json::Value::String(s) => out.push(s.clone()),
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(item, out);
                }
            }
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(text)) = map.get("text") {
                    out.push(text.clone());
                }
                if let Some(children) = map.get("children") {
                    walk(children, out);
                }
            }
            _ => {}
        }
    }

    let mut parts = Vec::new();
    walk(value, &mut parts);
    parts.join(" ")
}

// ── Tags ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreTag {
    pub id: u64,
    #[serde(rename = "Genre")]
    pub genre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodTag {
    pub id: u64,
    #[serde(rename = "Mood_or_Vibe")]
    pub mood: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeTag {
    pub id: u64,
    #[serde(rename = "Theme")]
    pub theme: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationTag {
    pub id: u64,
    #[serde(rename = "Location")]
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Genre,
    Mood,
    Theme,
    Location,
}

impl TagKind {
    /// CMS collection name for this tag kind.
    pub fn collection(&self) -> &'static str {
        match self {
            TagKind::Genre => "tag-genres",
            TagKind::Mood => "tag-mood-vibes",
            TagKind::Theme => "tag-themes",
            TagKind::Location => "tag-locations",
        }
    }

    /// Relation field name on the owning entity.
    pub fn relation(&self) -> &'static str {
        match self {
            TagKind::Genre => "tag_genres",
            TagKind::Mood => "tag_mood_vibes",
            TagKind::Theme => "tag_themes",
            TagKind::Location => "tag_locations",
        }
    }

    /// Value field name on the tag record itself.
    pub fn value_field(&self) -> &'static str {
        match self {
            TagKind::Genre => "Genre",
            TagKind::Mood => "Mood_or_Vibe",
            TagKind::Theme => "Theme",
            TagKind::Location => "Location",
        }
    }
}

impl std::str::FromStr for TagKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genre" => Ok(TagKind::Genre),
            "mood" => Ok(TagKind::Mood),
            "theme" => Ok(TagKind::Theme),
            "location" => Ok(TagKind::Location),
            _ => Err(()),
        }
    }
}

// ── Entities ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracklistEntry {
    pub id: u64,
    #[serde(rename = "Artist")]
    pub artist: String,
    #[serde(rename = "Track_Title")]
    pub track_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistReference {
    pub id: u64,
    #[serde(rename = "ArtistName")]
    pub name: String,
    #[serde(rename = "Artist_Slug")]
    pub slug: String,
    #[serde(rename = "ArtistInstagram", default)]
    pub instagram: Option<String>,
    #[serde(rename = "ArtistImage", default)]
    pub image: Option<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowReference {
    pub id: u64,
    #[serde(rename = "ShowName")]
    pub name: String,
    #[serde(rename = "ShowSlug")]
    pub slug: String,
    #[serde(rename = "Show_Instagram", default)]
    pub instagram: Option<String>,
    #[serde(rename = "ShowImage", default)]
    pub image: Option<Image>,
    #[serde(rename = "Main_Host", default)]
    pub main_host: Vec<ArtistReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    #[serde(rename = "EpisodeTitle")]
    pub title: String,
    #[serde(rename = "EpisodeSlug")]
    pub slug: String,
    #[serde(rename = "EpisodeDescription", default)]
    pub description: Option<String>,
    #[serde(rename = "BroadcastDateTime")]
    pub broadcast: DateTime<Utc>,
    #[serde(rename = "Tracklist", default)]
    pub tracklist: Vec<TracklistEntry>,
    #[serde(rename = "SoundcloudLink", default)]
    pub soundcloud_link: Option<String>,
    #[serde(rename = "MixCloudLink", default)]
    pub mixcloud_link: Option<String>,
    #[serde(rename = "StaffPick", default)]
    pub staff_pick: Option<bool>,
    #[serde(rename = "StaffPickComments", default)]
    pub staff_pick_comments: Option<String>,
    #[serde(rename = "EpisodeImage", default)]
    pub image: Option<Image>,
    #[serde(rename = "link_episode_to_show", default)]
    pub show: Option<ShowReference>,
    #[serde(rename = "guest_artists", default)]
    pub guest_artists: Vec<ArtistReference>,
    #[serde(rename = "tag_genres", default)]
    pub tag_genres: Vec<GenreTag>,
    #[serde(rename = "tag_mood_vibes", default)]
    pub tag_moods: Vec<MoodTag>,
    #[serde(rename = "tag_themes", default)]
    pub tag_themes: Vec<ThemeTag>,
}

impl Episode {
    /// On-demand playback source: Soundcloud first, then Mixcloud.
    pub fn stream_link(&self) -> Option<&str> {
        self.soundcloud_link
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.mixcloud_link.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: u64,
    #[serde(rename = "ShowName")]
    pub name: String,
    #[serde(rename = "ShowSlug")]
    pub slug: String,
    #[serde(rename = "ShowDescription", default)]
    pub description: Option<RichText>,
    #[serde(rename = "Show_Instagram", default)]
    pub instagram: Option<String>,
    #[serde(rename = "Broadcast_Day", default)]
    pub broadcast_day: Option<String>,
    #[serde(rename = "Broadcast_Time", default)]
    pub broadcast_hour: Option<u8>,
    #[serde(rename = "Broadcast_AmPm", default)]
    pub broadcast_am_pm: Option<String>,
    #[serde(rename = "ShowImage", default)]
    pub image: Option<Image>,
    #[serde(rename = "Main_Host", default)]
    pub main_host: Vec<ArtistReference>,
    #[serde(rename = "Show_Episodes", default)]
    pub episodes: Vec<Episode>,
}

impl Show {
    pub fn reference(&self) -> ShowReference {
        ShowReference {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
            instagram: self.instagram.clone(),
            image: self.image.clone(),
            main_host: self.main_host.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    #[serde(rename = "ArtistName")]
    pub name: String,
    #[serde(rename = "Artist_Slug")]
    pub slug: String,
    #[serde(rename = "ArtistBio", default)]
    pub bio: Option<String>,
    #[serde(rename = "ArtistInstagram", default)]
    pub instagram: Option<String>,
    #[serde(rename = "ArtistWebsite", default)]
    pub website: Option<String>,
    #[serde(rename = "ArtistImage", default)]
    pub image: Option<Image>,
    #[serde(rename = "Main_host", default)]
    pub hosted_shows: Vec<ShowReference>,
    #[serde(rename = "episodes_guest_featured", default)]
    pub guest_episodes: Vec<Episode>,
    #[serde(rename = "tag_locations", default)]
    pub tag_locations: Vec<LocationTag>,
}

/// Static about-page content. Lives in the CMS either as a single type or,
/// on older installs, as a one-record collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AboutPage {
    pub id: u64,
    #[serde(rename = "AboutPageText", default)]
    pub body: Option<RichText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: u64,
    #[serde(rename = "News_Title")]
    pub title: String,
    #[serde(rename = "News_Slug")]
    pub slug: String,
    #[serde(rename = "News_Text", default)]
    pub body: Option<RichText>,
    #[serde(rename = "CoverImage", default)]
    pub cover_image: Option<Image>,
    #[serde(rename = "Additional_Images", default)]
    pub additional_images: Vec<Image>,
    #[serde(rename = "artists", default)]
    pub authors: Vec<ArtistReference>,
}
