//! End-to-end schedule reconciliation against stubbed upstreams: source
//! selection by date, the show resolution chain, and the none-vs-empty
//! contract.

mod common {
    pub mod stub_api;
}

use chrono::NaiveDate;
use common::stub_api::{collection, empty_collection, event_list, spawn, StubApi};
use station_core::calendar::CalendarClient;
use station_core::cms::CmsClient;
use station_core::config::{CalendarConfig, CmsConfig};
use station_core::lookup::ShowCatalogCache;
use station_core::schedule::ScheduleService;
use std::sync::Arc;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn shows_body() -> String {
    collection(
        serde_json::json!([
            {"id": 1, "ShowName": "The Night Shift", "ShowSlug": "the-night-shift"},
            {"id": 2, "ShowName": "Sister's Show", "ShowSlug": "sisters-show"},
            {"id": 3, "ShowName": "Daybreak", "ShowSlug": "daybreak"}
        ]),
        3,
    )
}

fn service_for(base_url: &str) -> ScheduleService {
    let cms = CmsClient::new(&CmsConfig {
        base_url: base_url.to_string(),
        ..Default::default()
    });
    let calendar = CalendarClient::new(&CalendarConfig {
        base_url: base_url.to_string(),
        calendar_id: "schedule@station.example".to_string(),
        ..Default::default()
    });
    ScheduleService::new(cms, calendar, Arc::new(ShowCatalogCache::new()))
}

#[tokio::test]
async fn resolution_chain_prefers_slug_then_name_then_fuzzy() {
    let stub = spawn(StubApi {
        shows: shows_body(),
        episodes: empty_collection(),
        calendar: event_list(serde_json::json!([
            {
                // slug wins even though the title names a different show
                "id": "e1",
                "summary": "The Night Shift",
                "start": {"dateTime": "2026-09-01T10:00:00Z"},
                "end": {"dateTime": "2026-09-01T12:00:00Z"},
                "extendedProperties": {"shared": {"showSlug": "daybreak"}}
            },
            {
                "id": "e2",
                "summary": "the night shift",
                "start": {"dateTime": "2026-09-01T12:00:00Z"},
                "end": {"dateTime": "2026-09-01T14:00:00Z"}
            },
            {
                "id": "e3",
                "summary": "Sister\u{2019}s Show",
                "start": {"dateTime": "2026-09-01T14:00:00Z"},
                "end": {"dateTime": "2026-09-01T16:00:00Z"}
            },
            {
                "id": "e4",
                "summary": "The Nihgt Shift",
                "start": {"dateTime": "2026-09-01T16:00:00Z"},
                "end": {"dateTime": "2026-09-01T18:00:00Z"}
            },
            {
                "id": "e5",
                "summary": "Completely Unrelated Takeover",
                "start": {"dateTime": "2026-09-01T18:00:00Z"},
                "end": {"dateTime": "2026-09-01T20:00:00Z"}
            }
        ])),
        ..Default::default()
    })
    .await;

    let service = service_for(&stub.base_url);
    let schedule = service
        .schedule_relative_to(date("2026-09-01"), date("2026-08-30"))
        .await
        .unwrap()
        .expect("events exist, schedule must be Some");

    let slugs: Vec<Option<&str>> = schedule.slots.iter().map(|s| s.show.slug()).collect();
    assert_eq!(
        slugs,
        vec![
            Some("daybreak"),        // extended-property slug
            Some("the-night-shift"), // case-insensitive exact name
            Some("sisters-show"),    // normalized apostrophe
            Some("the-night-shift"), // fuzzy (one transposition)
            None,                    // below threshold stays unlinked
        ]
    );
    assert_eq!(
        schedule.slots[4].show.label(),
        "Completely Unrelated Takeover"
    );
}

#[tokio::test]
async fn no_events_yields_none_not_empty() {
    let stub = spawn(StubApi {
        shows: shows_body(),
        episodes: empty_collection(),
        calendar: event_list(serde_json::json!([])),
        ..Default::default()
    })
    .await;

    let service = service_for(&stub.base_url);

    // future date, empty calendar
    let future = service
        .schedule_relative_to(date("2026-09-02"), date("2026-08-30"))
        .await
        .unwrap();
    assert!(future.is_none());

    // past date, no archived episodes
    let past = service
        .schedule_relative_to(date("2026-08-01"), date("2026-08-30"))
        .await
        .unwrap();
    assert!(past.is_none());
}

#[tokio::test]
async fn past_dates_use_archive_and_never_touch_the_calendar() {
    let stub = spawn(StubApi {
        shows: shows_body(),
        episodes: collection(
            serde_json::json!([{
                "id": 7,
                "EpisodeTitle": "Daybreak 014",
                "EpisodeSlug": "daybreak-014",
                "BroadcastDateTime": "2026-08-01T09:00:00Z",
                "link_episode_to_show": {"id": 3, "ShowName": "Daybreak", "ShowSlug": "daybreak"}
            }]),
            1,
        ),
        // calendar also has events on that date; they must be ignored
        calendar: event_list(serde_json::json!([{
            "id": "ghost",
            "summary": "The Night Shift",
            "start": {"dateTime": "2026-08-01T19:00:00Z"},
            "end": {"dateTime": "2026-08-01T21:00:00Z"}
        }])),
        ..Default::default()
    })
    .await;

    let service = service_for(&stub.base_url);
    let schedule = service
        .schedule_relative_to(date("2026-08-01"), date("2026-08-30"))
        .await
        .unwrap()
        .expect("archived episode exists");

    assert_eq!(schedule.slots.len(), 1);
    let slot = &schedule.slots[0];
    assert_eq!(slot.show.slug(), Some("daybreak"));
    assert_eq!(
        slot.episode.as_ref().map(|e| e.slug.as_str()),
        Some("daybreak-014")
    );
    assert_eq!((slot.end - slot.start).num_hours(), 2);

    assert!(
        stub.paths().iter().all(|p| !p.contains("/calendars/")),
        "calendar feed consulted for a past date: {:?}",
        stub.paths()
    );
}

#[tokio::test]
async fn catalog_is_fetched_once_across_schedules() {
    let stub = spawn(StubApi {
        shows: shows_body(),
        episodes: empty_collection(),
        calendar: event_list(serde_json::json!([{
            "id": "e1",
            "summary": "Daybreak",
            "start": {"dateTime": "2026-09-01T10:00:00Z"},
            "end": {"dateTime": "2026-09-01T12:00:00Z"}
        }])),
        ..Default::default()
    })
    .await;

    let service = service_for(&stub.base_url);
    for _ in 0..3 {
        service
            .schedule_relative_to(date("2026-09-01"), date("2026-08-30"))
            .await
            .unwrap();
    }

    let show_fetches = stub
        .paths()
        .iter()
        .filter(|p| p.starts_with("/api/shows"))
        .count();
    assert_eq!(show_fetches, 1, "catalog must be built exactly once");
}
