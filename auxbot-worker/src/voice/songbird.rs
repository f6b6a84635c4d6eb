//! songbird.rs
//!
//! Audio output through a standalone songbird `Driver`. The gateway side is
//! handled by [`crate::voice::gateway`]; this module only owns the UDP/RTP
//! voice connection and the currently playing track.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use songbird::events::{Event as SongbirdEvent, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use songbird::id::{ChannelId, GuildId, UserId};
use songbird::input::{File as FileInput, Input};
use songbird::tracks::{Track, TrackHandle};
use songbird::{Config, ConnectionInfo, Driver};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use auxbot_common::Error;

use crate::playback::{AudioSink, SinkEvent, SinkEventKind, TrackToken, VoiceTransport};
use crate::voice::gateway::{GatewayHandle, VoiceCredentials};

/// Forwards one kind of track event to the engine, tagged with the token the
/// track was started under.
struct TrackEventForwarder {
    token: TrackToken,
    tx: UnboundedSender<SinkEvent>,
    kind: TrackEvent,
}

#[async_trait]
impl VoiceEventHandler for TrackEventForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<SongbirdEvent> {
        let kind = match self.kind {
            TrackEvent::Play => SinkEventKind::Playing,
            TrackEvent::Pause => SinkEventKind::Paused,
            TrackEvent::Preparing => SinkEventKind::Buffering,
            TrackEvent::End => SinkEventKind::Finished,
            TrackEvent::Error => {
                let detail = match ctx {
                    EventContext::Track(tracks) => tracks
                        .first()
                        .map(|(state, _)| format!("{:?}", state.playing))
                        .unwrap_or_else(|| "unknown track error".to_string()),
                    _ => "unknown track error".to_string(),
                };
                SinkEventKind::Errored(detail)
            }
            _ => return None,
        };
        if self.tx.send(SinkEvent::new(self.token, kind)).is_err() {
            debug!("Sink event receiver dropped");
        }
        None
    }
}

pub struct SongbirdVoice {
    driver: Mutex<Driver>,
    track: Mutex<Option<TrackHandle>>,
    events: UnboundedSender<SinkEvent>,
    gateway: tokio::sync::Mutex<Option<GatewayHandle>>,
}

impl SongbirdVoice {
    /// Creates the driver. Must be called inside a tokio runtime.
    pub fn new(events: UnboundedSender<SinkEvent>) -> Self {
        Self {
            driver: Mutex::new(Driver::new(Config::default())),
            track: Mutex::new(None),
            events,
            gateway: tokio::sync::Mutex::new(None),
        }
    }

    /// Open the voice connection described by `credentials`. The gateway
    /// handle is kept so `disconnect()` can also leave the channel.
    pub async fn connect(
        &self,
        credentials: VoiceCredentials,
        gateway: GatewayHandle,
        timeout: Duration,
    ) -> Result<(), Error> {
        let info = ConnectionInfo {
            channel_id: Some(ChannelId::from(credentials.channel_id)),
            endpoint: credentials.endpoint,
            guild_id: GuildId::from(credentials.guild_id),
            session_id: credentials.session_id,
            token: credentials.token,
            user_id: UserId::from(credentials.user_id),
        };
        *self.gateway.lock().await = Some(gateway);

        let connecting = self.driver.lock().connect(info);
        tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| Error::Voice(format!("Voice connection timed out after {:?}", timeout)))?
            .map_err(|e| Error::Voice(format!("Voice connection failed: {e}")))?;

        info!("Joined voice channel {}", credentials.channel_id);
        Ok(())
    }

    fn with_track<F>(&self, op: &str, f: F) -> Result<(), Error>
    where
        F: FnOnce(&TrackHandle) -> songbird::tracks::TrackResult<()>,
    {
        let guard = self.track.lock();
        let Some(handle) = guard.as_ref() else {
            return Err(Error::Sink(format!("Cannot {op}: no active track")));
        };
        f(handle).map_err(|e| Error::Sink(format!("Failed to {op} track: {e}")))
    }
}

/// Output level for every track, half of full scale.
pub const DEFAULT_VOLUME: f32 = 0.5;

fn track_for(path: &Path) -> Track {
    let input: Input = FileInput::new(path.to_path_buf()).into();
    Track::from(input).volume(DEFAULT_VOLUME)
}

impl AudioSink for SongbirdVoice {
    fn play(&self, path: &Path, token: TrackToken) -> Result<(), Error> {
        let handle = self.driver.lock().play_only(track_for(path));

        for kind in [
            TrackEvent::Play,
            TrackEvent::Pause,
            TrackEvent::Preparing,
            TrackEvent::End,
            TrackEvent::Error,
        ] {
            let forwarder = TrackEventForwarder {
                token,
                tx: self.events.clone(),
                kind,
            };
            handle
                .add_event(SongbirdEvent::Track(kind), forwarder)
                .map_err(|e| Error::Sink(format!("Failed to register track event: {e}")))?;
        }

        debug!("Playing {} (token {})", path.display(), token);
        *self.track.lock() = Some(handle);
        Ok(())
    }

    fn pause(&self) -> Result<(), Error> {
        self.with_track("pause", |t| t.pause())
    }

    fn resume(&self) -> Result<(), Error> {
        self.with_track("resume", |t| t.play())
    }

    fn stop(&self) {
        if let Some(handle) = self.track.lock().take() {
            if let Err(e) = handle.stop() {
                debug!("Stopping finished track: {e}");
            }
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdVoice {
    async fn disconnect(&self) -> Result<(), Error> {
        self.stop();
        self.driver.lock().leave();

        match self.gateway.lock().await.take() {
            Some(gateway) => gateway.leave().await,
            None => {
                warn!("Voice disconnect requested with no gateway session");
                Ok(())
            }
        }
    }
}
