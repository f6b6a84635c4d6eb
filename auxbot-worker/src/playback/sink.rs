//! Boundary with the audio transport library.
//!
//! The engine only needs a sink it can feed a local file to, pause, resume
//! and stop, plus a voice transport it can tear down on shutdown. Sink state
//! changes come back as [`SinkEvent`]s over a channel, tagged with the token
//! of the track they belong to.

use std::path::Path;

use async_trait::async_trait;
use auxbot_common::Error;

/// Identifies one `advance()`; events carrying an older token are stale.
pub type TrackToken = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEventKind {
    Playing,
    Buffering,
    Paused,
    /// Output ended on its own or was stopped.
    Finished,
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub token: TrackToken,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn new(token: TrackToken, kind: SinkEventKind) -> Self {
        Self { token, kind }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait AudioSink: Send + Sync {
    /// Start playing `path`, replacing whatever was playing.
    fn play(&self, path: &Path, token: TrackToken) -> Result<(), Error>;
    fn pause(&self) -> Result<(), Error>;
    fn resume(&self) -> Result<(), Error>;
    /// Stop output. Safe to call when nothing is playing.
    fn stop(&self);
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn disconnect(&self) -> Result<(), Error>;
}
