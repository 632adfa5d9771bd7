use serde::{Deserialize, Serialize};

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way; clients check it in the Hello frame and can refuse to talk
/// to an incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Tune the live stream.
    PlayLive,
    /// Play an on-demand episode. Implicitly stops the live stream.
    PlayEpisode {
        slug: String,
        title: String,
        stream_url: String,
    },
    Stop,
    Volume { value: f32 },
    GetState,
}

/// Messages sent from the daemon to clients (broadcasts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// Sent immediately on connect: daemon version + full state snapshot.
    Hello {
        protocol_version: u32,
        rev: u64,
        state: PlayerState,
    },
    State { data: PlayerState },
    NowPlaying { title: Option<String> },
    Log { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle, // nothing loaded / explicitly stopped
    Loading, // source loaded, buffering/connecting
    Playing, // audio flowing
    Error,   // failed to play (timeout or player error)
}

/// The single active audio source. At most one of live stream and episode
/// playback can be on; that exclusion is carried by this type rather than
/// by separate booleans.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ActiveSource {
    #[default]
    None,
    Live,
    Episode {
        slug: String,
        title: String,
        stream_url: String,
    },
}

impl ActiveSource {
    pub fn is_none(&self) -> bool {
        matches!(self, ActiveSource::None)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ActiveSource::Live)
    }

    /// Label for status displays; `None` when nothing is active.
    pub fn label(&self) -> Option<&str> {
        match self {
            ActiveSource::None => None,
            ActiveSource::Live => Some("live"),
            ActiveSource::Episode { title, .. } => Some(title),
        }
    }
}

/// Full daemon state.  `rev` is a monotonically increasing counter bumped on
/// every change, so clients can detect missed updates and resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub rev: u64,
    pub active: ActiveSource,
    pub status: PlaybackStatus,
    pub volume: f32,
    /// Station stream reachability, polled every 30s regardless of playback.
    pub station_online: bool,
    /// Current show/track metadata, polled every 10s regardless of playback.
    pub now_playing: Option<String>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            rev: 0,
            active: ActiveSource::None,
            status: PlaybackStatus::Idle,
            volume: 0.5,
            station_online: true,
            now_playing: None,
        }
    }
}

/// Wrapper for socket communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Broadcast(Broadcast),
}

impl Message {
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = json.len() as u32;
        let mut result = Vec::with_capacity(4 + json.len());
        result.extend_from_slice(&len.to_be_bytes());
        result.extend_from_slice(&json);
        Ok(result)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<(Self, usize)> {
        if data.len() < 4 {
            anyhow::bail!("Insufficient data for length header");
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() < 4 + len {
            anyhow::bail!("Insufficient data for message");
        }
        let msg: Self = serde_json::from_slice(&data[4..4 + len])?;
        Ok((msg, 4 + len))
    }
}
