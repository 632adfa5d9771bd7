//! Guest chat identity and provider client.
//!
//! Chat itself is delegated to an external real-time provider; this module
//! only owns the anonymous guest identity (generated locally, persisted via
//! the state sidecar) and the thin REST calls for connect and channel join.
//! A stored identity is tried first on connect; if the provider rejects it
//! the identity is regenerated once.

use crate::config::ChatConfig;
use crate::error::{Result, StationError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub id: String,
    pub token: String,
}

impl GuestIdentity {
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|c| c.to_ascii_lowercase() as char)
            .collect();
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        Self {
            id: format!("guest-{suffix}"),
            token,
        }
    }
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    id: &'a str,
    token: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct JoinRequest<'a> {
    id: &'a str,
    channel: &'a str,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    channel_id: String,
}

impl ChatClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            channel_id: config.channel_id.clone(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<()> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StationError::Http {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }

    pub async fn connect_guest(&self, identity: &GuestIdentity, display_name: &str) -> Result<()> {
        self.post(
            "/guests/connect",
            &ConnectRequest {
                id: &identity.id,
                token: &identity.token,
                name: if display_name.is_empty() {
                    "Anonymous"
                } else {
                    display_name
                },
            },
        )
        .await
    }

    /// Connect with the stored identity if there is one, regenerating it
    /// when the provider refuses the reconnect. Returns the identity that
    /// actually connected, for the caller to persist.
    pub async fn connect_or_regenerate(
        &self,
        stored: Option<GuestIdentity>,
        display_name: &str,
    ) -> Result<GuestIdentity> {
        if let Some(identity) = stored {
            match self.connect_guest(&identity, display_name).await {
                Ok(()) => return Ok(identity),
                Err(err) => {
                    warn!("stored guest identity rejected, regenerating: {err}");
                }
            }
        }

        let fresh = GuestIdentity::generate();
        self.connect_guest(&fresh, display_name).await?;
        info!("connected new guest identity {}", fresh.id);
        Ok(fresh)
    }

    pub async fn join_channel(&self, identity: &GuestIdentity) -> Result<()> {
        self.post(
            "/channels/join",
            &JoinRequest {
                id: &identity.id,
                channel: &self.channel_id,
            },
        )
        .await
    }

    pub async fn update_display_name(
        &self,
        identity: &GuestIdentity,
        display_name: &str,
    ) -> Result<()> {
        self.post(
            "/guests/update",
            &ConnectRequest {
                id: &identity.id,
                token: &identity.token,
                name: if display_name.is_empty() {
                    "Anonymous"
                } else {
                    display_name
                },
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identity_shape() {
        let identity = GuestIdentity::generate();
        assert!(identity.id.starts_with("guest-"));
        assert_eq!(identity.id.len(), "guest-".len() + 9);
        assert_eq!(identity.token.len(), 32);
    }

    #[test]
    fn test_generated_identities_are_distinct() {
        let a = GuestIdentity::generate();
        let b = GuestIdentity::generate();
        assert_ne!(a.id, b.id);
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_identity_serde_roundtrip() {
        let identity = GuestIdentity::generate();
        let json = serde_json::to_string(&identity).unwrap();
        let back: GuestIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, back);
    }
}
