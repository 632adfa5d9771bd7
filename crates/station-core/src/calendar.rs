//! Calendar REST client.
//!
//! Fetches events from a public calendar feed within a time window. Each
//! event may carry a show slug in its shared extended properties, which the
//! schedule reconciler prefers over title matching.

use crate::config::CalendarConfig;
use crate::error::{Result, StationError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(rename = "extendedProperties", default)]
    pub extended_properties: Option<ExtendedProperties>,
}

impl CalendarEvent {
    /// Explicit show slug from the event's shared extended properties.
    pub fn show_slug(&self) -> Option<&str> {
        self.extended_properties
            .as_ref()?
            .shared
            .as_ref()?
            .show_slug
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime")]
    pub date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub shared: Option<SharedProperties>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SharedProperties {
    #[serde(rename = "showSlug", default)]
    pub show_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    api_key: String,
    max_results: u32,
}

impl CalendarClient {
    pub fn new(config: &CalendarConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        }
    }

    /// Events whose start falls within `[start, end]` (whole days, UTC),
    /// recurring events expanded, sorted by start time.
    pub async fn events_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencode(&self.calendar_id)
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("timeMin", &format!("{start}T00:00:00Z")),
                ("timeMax", &format!("{end}T23:59:59Z")),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", &self.max_results.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Calendar API error from {}: {}", url, body);
            return Err(StationError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let list: EventListResponse = response.json().await?;
        Ok(list.items)
    }

    pub async fn events_for_date(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        self.events_between(date, date).await
    }
}

fn urlencode(s: &str) -> String {
    // Calendar ids are email-like; '@' is the only character that needs care.
    s.replace('@', "%40")
}
