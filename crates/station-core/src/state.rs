//! Daemon state manager.
//!
//! Holds the live [`PlayerState`] behind an `RwLock` and persists the small
//! durable remainder (volume, guest chat identity, display name) to a JSON
//! sidecar so it survives restarts.

use crate::chat::GuestIdentity;
use crate::protocol::{ActiveSource, PlaybackStatus, PlayerState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    pub volume: f32,
    /// Anonymous chat identity; regenerated when reconnection fails.
    #[serde(default)]
    pub guest: Option<GuestIdentity>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            volume: 0.5,
            guest: None,
            display_name: None,
        }
    }
}

pub struct StateManager {
    state: Arc<RwLock<PlayerState>>,
    persistent: RwLock<PersistentState>,
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        let persistent = Self::load_persistent(&state_file);

        let state = PlayerState {
            volume: persistent.volume,
            ..Default::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            persistent: RwLock::new(persistent),
            state_file,
        }
    }

    pub fn arc(&self) -> Arc<RwLock<PlayerState>> {
        Arc::clone(&self.state)
    }

    pub async fn get_state(&self) -> PlayerState {
        self.state.read().await.clone()
    }

    /// Replace the active source and mark it loading. The previous source is
    /// implicitly gone — there is only one slot.
    pub async fn set_active(&self, active: ActiveSource) {
        let mut state = self.state.write().await;
        state.status = if active.is_none() {
            PlaybackStatus::Idle
        } else {
            PlaybackStatus::Loading
        };
        state.active = active;
        state.rev += 1;
    }

    pub async fn set_stopped(&self) {
        let mut state = self.state.write().await;
        state.active = ActiveSource::None;
        state.status = PlaybackStatus::Idle;
        state.rev += 1;
    }

    pub async fn set_status(&self, status: PlaybackStatus) {
        let mut state = self.state.write().await;
        state.status = status;
        state.rev += 1;
    }

    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        {
            let mut state = self.state.write().await;
            state.volume = volume;
            state.rev += 1;
        }
        self.persistent.write().await.volume = volume;
        self.save().await
    }

    pub async fn set_online(&self, online: bool) {
        let mut state = self.state.write().await;
        if state.station_online != online {
            state.station_online = online;
            state.rev += 1;
        }
    }

    pub async fn set_now_playing(&self, title: Option<String>) {
        let mut state = self.state.write().await;
        if state.now_playing != title {
            state.now_playing = title;
            state.rev += 1;
        }
    }

    // ── Guest chat identity ───────────────────────────────────────────────────

    pub async fn guest_identity(&self) -> Option<GuestIdentity> {
        self.persistent.read().await.guest.clone()
    }

    pub async fn set_guest_identity(&self, guest: Option<GuestIdentity>) -> anyhow::Result<()> {
        self.persistent.write().await.guest = guest;
        self.save().await
    }

    pub async fn display_name(&self) -> Option<String> {
        self.persistent.read().await.display_name.clone()
    }

    pub async fn set_display_name(&self, name: Option<String>) -> anyhow::Result<()> {
        self.persistent.write().await.display_name =
            name.filter(|n| !n.trim().is_empty());
        self.save().await
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    async fn save(&self) -> anyhow::Result<()> {
        let persistent = self.persistent.read().await.clone();

        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash mid-write never truncates the sidecar.
        let json = serde_json::to_string_pretty(&persistent)?;
        let tmp = self.state_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.state_file).await?;
        Ok(())
    }

    fn load_persistent(state_file: &PathBuf) -> PersistentState {
        if let Ok(content) = std::fs::read_to_string(state_file) {
            if let Ok(persistent) = serde_json::from_str::<PersistentState>(&content) {
                return persistent;
            }
        }
        PersistentState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_state_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("station-state-test-{name}.json"))
    }

    #[tokio::test]
    async fn test_active_source_is_exclusive() {
        let manager = StateManager::new(temp_state_file("exclusive"));

        manager.set_active(ActiveSource::Live).await;
        assert!(manager.get_state().await.active.is_live());

        manager
            .set_active(ActiveSource::Episode {
                slug: "ep".into(),
                title: "Ep".into(),
                stream_url: "u".into(),
            })
            .await;
        let state = manager.get_state().await;
        assert!(!state.active.is_live());
        assert_eq!(state.status, PlaybackStatus::Loading);
    }

    #[tokio::test]
    async fn test_rev_increases_on_change() {
        let manager = StateManager::new(temp_state_file("rev"));
        let before = manager.get_state().await.rev;
        manager.set_active(ActiveSource::Live).await;
        manager.set_status(PlaybackStatus::Playing).await;
        assert!(manager.get_state().await.rev > before);
    }

    #[tokio::test]
    async fn test_online_flip_only_bumps_on_change() {
        let manager = StateManager::new(temp_state_file("online"));
        manager.set_online(true).await; // default is already online
        let rev = manager.get_state().await.rev;
        manager.set_online(true).await;
        assert_eq!(manager.get_state().await.rev, rev);
        manager.set_online(false).await;
        assert!(manager.get_state().await.rev > rev);
    }

    #[tokio::test]
    async fn test_persistent_roundtrip() {
        let file = temp_state_file("roundtrip");
        let _ = std::fs::remove_file(&file);

        let manager = StateManager::new(file.clone());
        manager.set_volume(0.8).await.unwrap();
        manager
            .set_display_name(Some("dub fan".into()))
            .await
            .unwrap();

        let reloaded = StateManager::new(file.clone());
        assert!((reloaded.get_state().await.volume - 0.8).abs() < f32::EPSILON);
        assert_eq!(reloaded.display_name().await.as_deref(), Some("dub fan"));

        let _ = std::fs::remove_file(&file);
    }

    #[tokio::test]
    async fn test_save_replaces_sidecar_without_leftover_temp() {
        let file = temp_state_file("atomic");
        let _ = std::fs::remove_file(&file);

        let manager = StateManager::new(file.clone());
        manager.set_volume(0.3).await.unwrap();
        manager.set_volume(0.7).await.unwrap();

        let content = std::fs::read_to_string(&file).unwrap();
        let persistent: PersistentState = serde_json::from_str(&content).unwrap();
        assert!((persistent.volume - 0.7).abs() < f32::EPSILON);
        assert!(!file.with_extension("json.tmp").exists());

        let _ = std::fs::remove_file(&file);
    }
}
