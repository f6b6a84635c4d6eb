pub mod engine;
pub mod sink;
pub mod state;

pub use engine::{AddOutcome, EngineConfig, PlaybackEngine, PlayerSnapshot, SkipOutcome};
pub use sink::{AudioSink, SinkEvent, SinkEventKind, TrackToken, VoiceTransport};
pub use state::{InvalidTransition, PlaybackState, Transition};
