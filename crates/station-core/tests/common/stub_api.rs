//! Minimal canned-response HTTP server for exercising the CMS and calendar
//! clients without real upstreams. Serves fixed JSON bodies keyed on the
//! request path and records every request line for assertions.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub struct StubApi {
    pub shows: String,
    pub episodes: String,
    pub calendar: String,
    /// Single-type about endpoint; `None` serves a 404 so clients take the
    /// collection fallback.
    pub about_single: Option<String>,
    pub about_collection: String,
}

pub struct StubHandle {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl StubHandle {
    pub fn paths(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn empty_collection() -> String {
    r#"{"data": [], "meta": {"pagination": {"page": 1, "pageSize": 100, "pageCount": 0, "total": 0}}}"#
        .to_string()
}

pub fn collection(data: serde_json::Value, total: u64) -> String {
    serde_json::json!({
        "data": data,
        "meta": {"pagination": {"page": 1, "pageSize": 100, "pageCount": 1, "total": total}}
    })
    .to_string()
}

pub fn event_list(items: serde_json::Value) -> String {
    serde_json::json!({ "kind": "calendar#events", "items": items }).to_string()
}

/// Bind on an ephemeral port and serve canned responses until dropped.
pub async fn spawn(api: StubApi) -> StubHandle {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let api = api.clone();
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16384];
                let mut read = 0;
                // read until end of headers; requests carry no body
                loop {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) => return,
                        Ok(n) => read += n,
                        Err(_) => return,
                    }
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let head = String::from_utf8_lossy(&buf[..read]);
                let path = head
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                log.lock().unwrap().push(path.clone());

                let (status, body) = if path.contains("/calendars/") {
                    ("200 OK", api.calendar.clone())
                } else if path.starts_with("/api/shows") {
                    ("200 OK", api.shows.clone())
                } else if path.starts_with("/api/episodes") {
                    ("200 OK", api.episodes.clone())
                } else if path.starts_with("/api/about-pages") {
                    ("200 OK", api.about_collection.clone())
                } else if path.starts_with("/api/about-page") {
                    match &api.about_single {
                        Some(single) => ("200 OK", single.clone()),
                        None => ("404 Not Found", r#"{"data":null}"#.to_string()),
                    }
                } else {
                    ("200 OK", empty_collection())
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    StubHandle { base_url, requests }
}
