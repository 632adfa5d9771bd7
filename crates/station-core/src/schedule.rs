//! Schedule reconciliation.
//!
//! A per-date schedule is synthesized on request from two disjoint sources:
//! past dates come from archived episode broadcast records, today and future
//! dates from the calendar feed. Calendar events are resolved to catalog
//! shows by, in order: the event's embedded slug, exact name, normalized
//! name, fuzzy similarity. An event that matches nothing still produces a
//! slot labelled with its raw title, just without a link.

use crate::calendar::{CalendarClient, CalendarEvent};
use crate::cms::CmsClient;
use crate::error::Result;
use crate::lookup::{ShowCatalog, ShowCatalogCache};
use crate::model::{Episode, ShowReference};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Estimated slot length for archived episodes, which record only a start.
fn default_episode_slot() -> Duration {
    Duration::hours(2)
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub slots: Vec<ShowSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub show: SlotShow,
    /// Present only for past dates, linking the slot straight to its episode.
    pub episode: Option<Episode>,
}

/// Resolved identity of a slot. Every slot has a human-readable label;
/// unlinked slots carry the raw calendar title and no deep link.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SlotShow {
    Linked(ShowReference),
    Unlinked { title: String },
}

impl SlotShow {
    pub fn label(&self) -> &str {
        match self {
            SlotShow::Linked(show) => &show.name,
            SlotShow::Unlinked { title } => title,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            SlotShow::Linked(show) => Some(&show.slug),
            SlotShow::Unlinked { .. } => None,
        }
    }
}

/// Resolve one calendar event against the catalog. Slug beats name beats
/// fuzzy; the raw title is the last resort.
fn resolve_event(event: &CalendarEvent, catalog: &ShowCatalog) -> SlotShow {
    if let Some(slug) = event.show_slug() {
        if let Some(show) = catalog.by_slug(slug) {
            return SlotShow::Linked(show.clone());
        }
    }

    if !event.summary.is_empty() {
        if let Some(show) = catalog.resolve_title(&event.summary) {
            return SlotShow::Linked(show.clone());
        }
    }

    let title = if event.summary.is_empty() {
        "Untitled broadcast".to_string()
    } else {
        event.summary.clone()
    };
    SlotShow::Unlinked { title }
}

/// Slots for today/future dates, from calendar events.
pub fn slots_from_events(events: &[CalendarEvent], catalog: &ShowCatalog) -> Vec<ShowSlot> {
    events
        .iter()
        .map(|event| ShowSlot {
            start: event.start.date_time,
            end: event.end.date_time,
            show: resolve_event(event, catalog),
            episode: None,
        })
        .collect()
}

/// Slots for past dates, from archived episode records. One slot per
/// episode, end time estimated, the episode itself attached for linking.
pub fn slots_from_episodes(episodes: &[Episode]) -> Vec<ShowSlot> {
    episodes
        .iter()
        .map(|episode| {
            let show = match &episode.show {
                Some(show) => SlotShow::Linked(show.clone()),
                None => SlotShow::Unlinked {
                    title: episode.title.clone(),
                },
            };
            ShowSlot {
                start: episode.broadcast,
                end: episode.broadcast + default_episode_slot(),
                show,
                episode: Some(episode.clone()),
            }
        })
        .collect()
}

pub struct ScheduleService {
    cms: CmsClient,
    calendar: CalendarClient,
    catalog: Arc<ShowCatalogCache>,
}

impl ScheduleService {
    pub fn new(cms: CmsClient, calendar: CalendarClient, catalog: Arc<ShowCatalogCache>) -> Self {
        Self {
            cms,
            calendar,
            catalog,
        }
    }

    /// The schedule for `date`, or `None` when nothing is scheduled — callers
    /// must distinguish that from an empty day of data. Errors from either
    /// upstream propagate as-is.
    pub async fn schedule_for_date(&self, date: NaiveDate) -> Result<Option<Schedule>> {
        self.schedule_relative_to(date, Utc::now().date_naive()).await
    }

    /// Same as [`schedule_for_date`](Self::schedule_for_date) with `today`
    /// injected, so the past/future split is testable.
    pub async fn schedule_relative_to(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Option<Schedule>> {
        if date < today {
            // Archive path: the calendar feed is never consulted for past days.
            let episodes = self.cms.episodes_on_date(date).await?;
            if episodes.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Schedule {
                date,
                slots: slots_from_episodes(&episodes),
            }));
        }

        let (events, catalog) = tokio::try_join!(
            self.calendar.events_for_date(date),
            self.catalog.get_or_build(&self.cms),
        )?;

        if events.is_empty() {
            return Ok(None);
        }

        Ok(Some(Schedule {
            date,
            slots: slots_from_events(&events, &catalog),
        }))
    }

    /// Calendar-backed schedules within `[start, end]`, grouped per day,
    /// newest first. Days without events are simply absent.
    pub async fn schedules_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Schedule>> {
        let (events, catalog) = tokio::try_join!(
            self.calendar.events_between(start, end),
            self.catalog.get_or_build(&self.cms),
        )?;

        let mut by_date: BTreeMap<NaiveDate, Vec<CalendarEvent>> = BTreeMap::new();
        for event in events {
            by_date
                .entry(event.start.date_time.date_naive())
                .or_default()
                .push(event);
        }

        Ok(by_date
            .into_iter()
            .rev()
            .map(|(date, day_events)| Schedule {
                date,
                slots: slots_from_events(&day_events, &catalog),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Show;

    fn show(id: u64, name: &str, slug: &str) -> Show {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "ShowName": name,
            "ShowSlug": slug,
        }))
        .unwrap()
    }

    fn event(id: &str, summary: &str, slug: Option<&str>) -> CalendarEvent {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "summary": summary,
            "start": {"dateTime": "2026-09-01T19:00:00Z"},
            "end": {"dateTime": "2026-09-01T21:00:00Z"},
            "extendedProperties": {"shared": {"showSlug": slug}}
        }))
        .unwrap()
    }

    fn episode(id: u64, title: &str, slug: &str, show_json: serde_json::Value) -> Episode {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "EpisodeTitle": title,
            "EpisodeSlug": slug,
            "BroadcastDateTime": "2026-03-14T19:00:00Z",
            "link_episode_to_show": show_json,
        }))
        .unwrap()
    }

    fn catalog() -> ShowCatalog {
        ShowCatalog::from_shows(&[
            show(1, "The Night Shift", "the-night-shift"),
            show(2, "Daybreak", "daybreak"),
        ])
    }

    #[test]
    fn test_slug_beats_title_text() {
        // title says one show, embedded slug says another; slug wins
        let slots = slots_from_events(
            &[event("e1", "The Night Shift", Some("daybreak"))],
            &catalog(),
        );
        assert_eq!(slots[0].show.slug(), Some("daybreak"));
    }

    #[test]
    fn test_unmatched_event_keeps_raw_title() {
        let slots = slots_from_events(&[event("e2", "Guest Takeover 002", None)], &catalog());
        assert_eq!(slots[0].show.label(), "Guest Takeover 002");
        assert_eq!(slots[0].show.slug(), None);
        assert!(slots[0].episode.is_none());
    }

    #[test]
    fn test_untitled_event_still_has_label() {
        let slots = slots_from_events(&[event("e3", "", None)], &catalog());
        assert_eq!(slots[0].show.label(), "Untitled broadcast");
    }

    #[test]
    fn test_episode_slot_spans_two_hours_and_links_episode() {
        let ep = episode(
            7,
            "Daybreak 014",
            "daybreak-014",
            serde_json::json!({"id": 2, "ShowName": "Daybreak", "ShowSlug": "daybreak"}),
        );
        let slots = slots_from_episodes(&[ep]);
        assert_eq!(slots[0].end - slots[0].start, Duration::hours(2));
        assert_eq!(slots[0].show.slug(), Some("daybreak"));
        assert_eq!(slots[0].episode.as_ref().unwrap().slug, "daybreak-014");
    }

    #[test]
    fn test_episode_without_show_is_unlinked_but_labelled() {
        let ep: Episode = serde_json::from_value(serde_json::json!({
            "id": 8,
            "EpisodeTitle": "One-off Special",
            "EpisodeSlug": "one-off-special",
            "BroadcastDateTime": "2026-03-14T19:00:00Z",
        }))
        .unwrap();
        let slots = slots_from_episodes(&[ep]);
        assert_eq!(slots[0].show.label(), "One-off Special");
        assert_eq!(slots[0].show.slug(), None);
    }
}
