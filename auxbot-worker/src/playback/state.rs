//! auxbot-worker/src/playback/state.rs
//!
//! The playback finite-state machine. [`PlaybackState::apply`] is the only
//! way to mutate it; the transition table below is exhaustive, so the
//! invariant `status == Idle <=> current_item == None` holds after every
//! successful call.

use tokio::time::Instant;

use auxbot_common::models::{PlayerStatus, QueueItem};
use auxbot_common::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// `advance()` popped an item and handed it to the fetcher.
    Start(QueueItem),
    /// `advance()` found the queue empty.
    Exhausted,
    /// Explicit pause command.
    Pause,
    /// Explicit resume command.
    Resume,
    /// The sink reports audible output.
    SinkPlaying,
    /// The sink is waiting on input.
    SinkBuffering,
    /// The sink reports it is paused.
    SinkPaused,
    /// Fetch or sink failure for the current item.
    Failed,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start(_) => "start",
            Transition::Exhausted => "exhausted",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::SinkPlaying => "sink_playing",
            Transition::SinkBuffering => "sink_buffering",
            Transition::SinkPaused => "sink_paused",
            Transition::Failed => "failed",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot apply '{transition}' while {from}")]
pub struct InvalidTransition {
    pub from: PlayerStatus,
    pub transition: &'static str,
}

impl From<InvalidTransition> for Error {
    fn from(e: InvalidTransition) -> Self {
        Error::InvalidTransition(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackState {
    status: PlayerStatus,
    current_item: Option<QueueItem>,
    last_activity_at: Instant,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            status: PlayerStatus::Idle,
            current_item: None,
            last_activity_at: Instant::now(),
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.current_item.as_ref()
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub fn is_idle(&self) -> bool {
        self.status == PlayerStatus::Idle
    }

    /// Records activity without a status change.
    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Single mutation entry point.
    pub fn apply(&mut self, transition: Transition) -> Result<PlayerStatus, InvalidTransition> {
        use PlayerStatus::*;

        let from = self.status;
        let name = transition.name();
        let invalid = || InvalidTransition { from, transition: name };

        match (from, transition) {
            (_, Transition::Start(item)) => {
                self.status = Playing;
                self.current_item = Some(item);
            }
            (_, Transition::Exhausted) => {
                self.status = Idle;
                self.current_item = None;
            }
            (Playing, Transition::Pause) => self.status = Paused,
            (Paused, Transition::Resume) => self.status = Playing,
            (Playing | Buffering | Paused, Transition::SinkPlaying) => self.status = Playing,
            (Playing | Buffering, Transition::SinkBuffering) => self.status = Buffering,
            (Playing | Buffering | Paused, Transition::SinkPaused) => self.status = Paused,
            (Playing | Buffering | Paused | Error, Transition::Failed) => self.status = Error,
            _ => return Err(invalid()),
        }

        self.last_activity_at = Instant::now();
        debug_assert_eq!(self.status == Idle, self.current_item.is_none());
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(r: &str) -> QueueItem {
        QueueItem::new(r, "user")
    }

    #[test]
    fn starts_idle_without_item() {
        let s = PlaybackState::new();
        assert_eq!(s.status(), PlayerStatus::Idle);
        assert!(s.current_item().is_none());
    }

    #[test]
    fn start_then_exhaust() {
        let mut s = PlaybackState::new();
        s.apply(Transition::Start(item("a"))).unwrap();
        assert_eq!(s.status(), PlayerStatus::Playing);
        assert_eq!(s.current_item().unwrap().media_ref, "a");
        s.apply(Transition::Exhausted).unwrap();
        assert!(s.is_idle());
        assert!(s.current_item().is_none());
    }

    #[test]
    fn pause_only_from_playing() {
        let mut s = PlaybackState::new();
        assert_eq!(
            s.apply(Transition::Pause),
            Err(InvalidTransition { from: PlayerStatus::Idle, transition: "pause" })
        );
        s.apply(Transition::Start(item("a"))).unwrap();
        s.apply(Transition::Pause).unwrap();
        assert!(s.apply(Transition::Pause).is_err());
        assert_eq!(s.status(), PlayerStatus::Paused);
    }

    #[test]
    fn resume_only_from_paused() {
        let mut s = PlaybackState::new();
        assert!(s.apply(Transition::Resume).is_err());
        s.apply(Transition::Start(item("a"))).unwrap();
        assert!(s.apply(Transition::Resume).is_err());
        s.apply(Transition::Pause).unwrap();
        s.apply(Transition::Resume).unwrap();
        assert_eq!(s.status(), PlayerStatus::Playing);
    }

    #[test]
    fn failure_keeps_item_and_recovers_through_start() {
        let mut s = PlaybackState::new();
        assert!(s.apply(Transition::Failed).is_err());
        s.apply(Transition::Start(item("a"))).unwrap();
        s.apply(Transition::Failed).unwrap();
        assert_eq!(s.status(), PlayerStatus::Error);
        assert_eq!(s.current_item().unwrap().media_ref, "a");
        s.apply(Transition::Start(item("b"))).unwrap();
        assert_eq!(s.status(), PlayerStatus::Playing);
    }

    #[test]
    fn sink_events_rejected_when_idle() {
        let mut s = PlaybackState::new();
        for t in [Transition::SinkPlaying, Transition::SinkBuffering, Transition::SinkPaused] {
            assert!(s.apply(t).is_err());
            assert!(s.is_idle());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn apply_touches_activity() {
        let mut s = PlaybackState::new();
        let before = s.last_activity_at();
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        s.apply(Transition::Start(item("a"))).unwrap();
        assert!(s.last_activity_at() > before);
    }
}
