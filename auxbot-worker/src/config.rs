//! Worker settings. Every option can come from the command line or from the
//! environment variable the controller sets on the pod.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::playback::EngineConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "auxbot-worker")]
#[command(author, version, about = "auxbot worker - plays one guild's queue in one voice channel")]
pub struct WorkerConfig {
    /// Bot token used for the gateway session.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    /// Tenant this worker serves.
    #[arg(long, env = "DISCORD_GUILD_ID")]
    pub discord_guild_id: String,

    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    pub discord_channel_id: String,

    #[arg(long, env = "GRPC_PORT", default_value_t = 50051)]
    pub grpc_port: u16,

    #[arg(long, env = "INACTIVITY_TIMEOUT_MINUTES", default_value_t = 20)]
    pub inactivity_timeout_minutes: u64,

    #[arg(long, env = "INACTIVITY_CHECK_INTERVAL_SECS", default_value_t = 60)]
    pub inactivity_check_interval_secs: u64,

    #[arg(long, env = "SHUTDOWN_GRACE_MS", default_value_t = 1000)]
    pub shutdown_grace_ms: u64,

    /// Where the controller's WorkerLifecycle service listens.
    #[arg(long, env = "CONTROLLER_ADDR", default_value = "http://controller:50051")]
    pub controller_addr: String,

    #[arg(long, env = "LIFECYCLE_TIMEOUT_SECS", default_value_t = 5)]
    pub lifecycle_timeout_secs: u64,

    /// Scratch directory for downloaded audio.
    #[arg(long, env = "MEDIA_DIR", default_value = "/tmp/auxbot")]
    pub media_dir: PathBuf,

    #[arg(long, env = "YT_DLP_PATH", default_value = "yt-dlp")]
    pub yt_dlp_path: String,

    /// A download still running after this long fails the track.
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 300)]
    pub fetch_timeout_secs: u64,

    #[arg(long, env = "VOICE_CONNECT_TIMEOUT_SECS", default_value_t = 60)]
    pub voice_connect_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.grpc_port))
    }

    pub fn lifecycle_timeout(&self) -> Duration {
        Duration::from_secs(self.lifecycle_timeout_secs)
    }

    pub fn voice_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.voice_connect_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tenant_id: self.discord_guild_id.clone(),
            inactivity_timeout: Duration::from_secs(self.inactivity_timeout_minutes * 60),
            check_interval: Duration::from_secs(self.inactivity_check_interval_secs),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}
