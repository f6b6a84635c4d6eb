//! auxbot-worker: one process per tenant. Joins a single voice channel,
//! plays that tenant's queue and exits after a period of inactivity.

pub mod config;
pub mod grpc_services;
pub mod lifecycle;
pub mod media;
pub mod playback;
pub mod queue;
pub mod server;
pub mod voice;

pub use config::WorkerConfig;
pub use playback::PlaybackEngine;
