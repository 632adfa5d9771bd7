//! Background pollers for station reachability and now-playing metadata.
//!
//! Both run for the lifetime of the daemon regardless of playback state and
//! report through the main event funnel. A failed poll never surfaces to
//! clients as an error: the status poll falls back to offline and the
//! now-playing poll to the configured station name.

use crate::core::DaemonEvent;
use serde::Deserialize;
use station_core::config::StreamConfig;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const STATUS_INTERVAL: Duration = Duration::from_secs(30);
const NOW_PLAYING_INTERVAL: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Deserialize)]
struct NowPlayingBody {
    data: NowPlayingData,
}

#[derive(Deserialize)]
struct NowPlayingData {
    #[serde(default)]
    title: Option<String>,
}

pub fn start_pollers(
    stream: StreamConfig,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let client = match reqwest::Client::builder().timeout(POLL_TIMEOUT).build() {
        Ok(c) => c,
        Err(_) => reqwest::Client::new(),
    };

    let mut handles = Vec::new();

    if !stream.status_url.is_empty() {
        let client = client.clone();
        let url = stream.status_url.clone();
        let tx = event_tx.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(STATUS_INTERVAL);
            loop {
                interval.tick().await;
                let online = poll_status(&client, &url).await;
                if tx.send(DaemonEvent::StationOnline(online)).await.is_err() {
                    break;
                }
            }
        }));
    }

    if !stream.now_playing_url.is_empty() {
        let url = stream.now_playing_url.clone();
        let station_name = stream.station_name.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(NOW_PLAYING_INTERVAL);
            loop {
                interval.tick().await;
                match poll_now_playing(&client, &url).await {
                    Some(title) => {
                        let title = title.filter(|t| !t.trim().is_empty());
                        let label = title.unwrap_or_else(|| station_name.clone());
                        if event_tx
                            .send(DaemonEvent::NowPlaying(Some(label)))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    // Transient failure: keep the last known title.
                    None => debug!("now-playing poll failed, keeping previous title"),
                }
            }
        }));
    }

    handles
}

async fn poll_status(client: &reqwest::Client, url: &str) -> bool {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            debug!("status poll failed: {}", e);
            return false;
        }
    };
    if !response.status().is_success() {
        debug!("status poll returned {}", response.status());
        return false;
    }
    match response.json::<StatusBody>().await {
        Ok(body) => body.status == "online",
        Err(e) => {
            debug!("status poll parse failed: {}", e);
            false
        }
    }
}

/// `Some(title)` on a successful poll (title may itself be absent),
/// `None` when the request or parse failed.
async fn poll_now_playing(client: &reqwest::Client, url: &str) -> Option<Option<String>> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let body = response.json::<NowPlayingBody>().await.ok()?;
    Some(body.data.title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_parses() {
        let body: StatusBody = serde_json::from_str(r#"{"status":"online"}"#).unwrap();
        assert_eq!(body.status, "online");
    }

    #[test]
    fn test_now_playing_title_optional() {
        let body: NowPlayingBody =
            serde_json::from_str(r#"{"data":{"title":"Dub Explorations"}}"#).unwrap();
        assert_eq!(body.data.title.as_deref(), Some("Dub Explorations"));

        let empty: NowPlayingBody = serde_json::from_str(r#"{"data":{}}"#).unwrap();
        assert!(empty.data.title.is_none());
    }
}
