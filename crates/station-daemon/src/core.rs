//! Daemon core: every external input funnels into one event loop, and every
//! playback transition passes through one reducer over the single
//! [`ActiveSource`] slot. Starting episode playback implicitly drops the
//! live stream and vice versa; there is no code path that can have both.

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE};
use crate::BroadcastMessage;
use station_core::config::Config;
use station_core::protocol::{ActiveSource, Command, PlaybackStatus};
use station_core::state::StateManager;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// How long a source may sit in Loading before it is declared failed.
const LOAD_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(15);

#[derive(Debug)]
pub enum DaemonEvent {
    /// A command arrived over the socket or the HTTP API.
    ClientCommand(Command),
    /// Unsolicited mpv event or property-change.
    Mpv(MpvEvent),
    /// The Loading watchdog fired for playback generation `n`.
    LoadTimeout(u64),
    /// Result of the 30s station status poll.
    StationOnline(bool),
    /// Result of the 10s now-playing poll.
    NowPlaying(Option<String>),
}

pub struct DaemonCore {
    config: Config,
    state_manager: Arc<StateManager>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    event_tx: mpsc::Sender<DaemonEvent>,
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    mpv_event_tx: mpsc::Sender<MpvEvent>,
    /// Bumped on every play command so stale Loading watchdogs are ignored.
    generation: u64,
}

impl DaemonCore {
    pub async fn new(
        config: Config,
        state_manager: Arc<StateManager>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> anyhow::Result<Self> {
        let volume = state_manager.get_state().await.volume;

        // mpv events flow through their own channel and are re-tagged into
        // the main funnel, so the reducer sees a single ordered stream.
        let (mpv_event_tx, mut mpv_event_rx) = mpsc::channel::<MpvEvent>(64);
        let forward_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = mpv_event_rx.recv().await {
                if forward_tx.send(DaemonEvent::Mpv(event)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config,
            state_manager,
            broadcast_tx,
            event_tx,
            driver: MpvDriver::new(volume),
            handle: None,
            mpv_event_tx,
            generation: 0,
        })
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        self.state_manager.clone()
    }

    pub async fn run(mut self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        while let Some(event) = event_rx.recv().await {
            match event {
                DaemonEvent::ClientCommand(cmd) => self.apply_command(cmd).await,
                DaemonEvent::Mpv(event) => self.handle_mpv_event(event).await,
                DaemonEvent::LoadTimeout(generation) => {
                    self.handle_load_timeout(generation).await
                }
                DaemonEvent::StationOnline(online) => {
                    self.state_manager.set_online(online).await;
                    self.notify_state();
                }
                DaemonEvent::NowPlaying(title) => {
                    let before = self.state_manager.get_state().await.now_playing;
                    if before != title {
                        self.state_manager.set_now_playing(title.clone()).await;
                        let _ = self
                            .broadcast_tx
                            .send(BroadcastMessage::NowPlaying(title));
                        self.notify_state();
                    }
                }
            }
        }
        self.driver.kill().await;
        Ok(())
    }

    // ── Playback reducer ──────────────────────────────────────────────────────

    async fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::PlayLive => {
                let url = self.config.live_stream_url().to_string();
                if url.is_empty() {
                    error!("no live stream URL configured");
                    self.broadcast_error("no live stream URL configured");
                    return;
                }
                self.start_source(ActiveSource::Live, &url).await;
            }
            Command::PlayEpisode {
                slug,
                title,
                stream_url,
            } => {
                let url = stream_url.clone();
                self.start_source(
                    ActiveSource::Episode {
                        slug,
                        title,
                        stream_url,
                    },
                    &url,
                )
                .await;
            }
            Command::Stop => {
                if let Some(handle) = &self.handle {
                    if let Err(e) = handle.stop().await {
                        warn!("mpv stop failed: {}", e);
                    }
                }
                self.state_manager.set_stopped().await;
                self.notify_state();
            }
            Command::Volume { value } => {
                if let Err(e) = self.state_manager.set_volume(value).await {
                    warn!("failed to persist volume: {}", e);
                }
                let volume = self.state_manager.get_state().await.volume;
                self.driver.last_volume = volume;
                if let Some(handle) = &self.handle {
                    if let Err(e) = handle.set_volume(volume).await {
                        warn!("mpv set_volume failed: {}", e);
                    }
                }
                self.notify_state();
            }
            Command::GetState => {
                self.notify_state();
            }
        }
    }

    /// Replace whatever was playing with `source`. The state transition and
    /// the mpv loadfile happen here and nowhere else.
    async fn start_source(&mut self, source: ActiveSource, url: &str) {
        info!("starting playback: {:?}", source.label());
        self.generation += 1;
        self.state_manager.set_active(source).await;
        self.notify_state();

        let handle = match self.ensure_mpv().await {
            Ok(h) => h,
            Err(e) => {
                error!("failed to start mpv: {}", e);
                self.state_manager.set_status(PlaybackStatus::Error).await;
                self.broadcast_error("audio player unavailable");
                self.notify_state();
                return;
            }
        };

        let volume = self.state_manager.get_state().await.volume;
        if let Err(e) = handle.load_stream(url, volume).await {
            error!("mpv loadfile failed: {}", e);
            self.state_manager.set_status(PlaybackStatus::Error).await;
            self.broadcast_error("failed to load stream");
            self.notify_state();
            return;
        }

        // Watchdog: if core-idle never clears, Loading becomes Error.
        let generation = self.generation;
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(LOAD_TIMEOUT).await;
            let _ = event_tx.send(DaemonEvent::LoadTimeout(generation)).await;
        });
    }

    async fn ensure_mpv(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv process died, respawning");
        }
        let handle = self
            .driver
            .spawn_and_connect(self.mpv_event_tx.clone())
            .await?;
        handle.observe_playback().await;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    // ── mpv feedback ──────────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, event: MpvEvent) {
        if let Some((OBS_CORE_IDLE, data)) = event.as_property_change() {
            let idle = data.as_bool().unwrap_or(true);
            let state = self.state_manager.get_state().await;
            if state.active.is_none() {
                return;
            }
            if !idle && state.status == PlaybackStatus::Loading {
                debug!("mpv: core-idle cleared, audio flowing");
                // The armed watchdog only covers the initial load; once audio
                // flows, bumping the generation retires it so a later
                // rebuffer inside the window cannot be declared a failure.
                self.generation += 1;
                self.state_manager.set_status(PlaybackStatus::Playing).await;
                self.notify_state();
            } else if idle && state.status == PlaybackStatus::Playing {
                // Rebuffering. The Loading watchdog is not re-armed here;
                // a stall either recovers or ends with an end-file event.
                debug!("mpv: core-idle set while playing, buffering");
                self.state_manager.set_status(PlaybackStatus::Loading).await;
                self.notify_state();
            }
            return;
        }

        if event.event_name() == Some("end-file") {
            let state = self.state_manager.get_state().await;
            if state.active.is_none() {
                return; // explicit stop already handled
            }
            match event.end_reason() {
                Some("eof") => {
                    info!("playback finished");
                    self.state_manager.set_stopped().await;
                }
                reason => {
                    warn!("playback ended unexpectedly: {:?}", reason);
                    self.state_manager.set_status(PlaybackStatus::Error).await;
                    self.broadcast_error("stream ended unexpectedly");
                }
            }
            self.notify_state();
        }
    }

    async fn handle_load_timeout(&mut self, generation: u64) {
        if generation != self.generation {
            return; // a newer play command superseded this watchdog
        }
        let state = self.state_manager.get_state().await;
        if state.status == PlaybackStatus::Loading && !state.active.is_none() {
            error!("stream did not start within {:?}", LOAD_TIMEOUT);
            self.state_manager.set_status(PlaybackStatus::Error).await;
            self.broadcast_error("stream did not start");
            self.notify_state();
        }
    }

    // ── Broadcast helpers ─────────────────────────────────────────────────────

    fn notify_state(&self) {
        // No receivers is fine: nobody is connected.
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    fn broadcast_error(&self, message: &str) {
        let _ = self
            .broadcast_tx
            .send(BroadcastMessage::Error(message.to_string()));
    }
}
