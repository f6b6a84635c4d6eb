use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use auxbot_common::traits::{ErrorReporter, ErrorTags, TracingReporter};
use auxbot_common::ShutdownSignal;
use auxbot_worker::grpc_services::{HealthServiceImpl, PlayerServiceImpl, SearchServiceImpl};
use auxbot_worker::lifecycle::{GrpcLifecycleClient, LifecycleNotifier};
use auxbot_worker::media::{YtDlpFetcher, YtDlpSearcher};
use auxbot_worker::server::{spawn_grpc_server, WorkerServices};
use auxbot_worker::voice::{join_voice_channel, SongbirdVoice};
use auxbot_worker::{PlaybackEngine, WorkerConfig};

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("auxbot=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let config = WorkerConfig::parse();
    info!(
        "auxbot worker starting. guild={}, channel={}, grpc_port={}",
        config.discord_guild_id, config.discord_channel_id, config.grpc_port
    );

    let code = run(config).await?;
    info!("Worker exiting with code {}", code);
    std::process::exit(code);
}

async fn run(config: WorkerConfig) -> anyhow::Result<i32> {
    let shutdown = ShutdownSignal::new();
    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
    let lifecycle: Arc<dyn LifecycleNotifier> = Arc::new(GrpcLifecycleClient::new(
        &config.controller_addr,
        config.discord_guild_id.clone(),
        config.lifecycle_timeout(),
    )?);

    // 1) Join the voice channel.
    let (sink_tx, sink_rx) = unbounded_channel();
    let voice = Arc::new(SongbirdVoice::new(sink_tx));
    let joined = async {
        let (credentials, gateway) = join_voice_channel(
            &config.discord_token,
            &config.discord_guild_id,
            &config.discord_channel_id,
            config.voice_connect_timeout(),
        )
        .await?;
        voice
            .connect(credentials, gateway, config.voice_connect_timeout())
            .await
    }
    .await;

    if let Err(e) = joined {
        reporter.report(
            &e,
            &ErrorTags::new("worker", "joinVoiceChannel").tenant(config.discord_guild_id.clone()),
        );
        // Without voice this worker is useless; let the controller reclaim it.
        if let Err(e) = lifecycle.notify_shutdown("voice_connect_failed").await {
            warn!("Failed to notify controller of shutdown: {}", e);
        }
        return Ok(1);
    }

    // 2) Playback engine.
    let fetcher = Arc::new(YtDlpFetcher::new(config.yt_dlp_path.clone(), config.media_dir.clone()));
    let engine = PlaybackEngine::new(
        config.engine_config(),
        voice.clone(),
        voice.clone(),
        fetcher,
        lifecycle.clone(),
        reporter.clone(),
        shutdown.clone(),
    );

    // 3) gRPC services.
    let health = HealthServiceImpl::new();
    let services = WorkerServices {
        player: PlayerServiceImpl::new(engine.clone()),
        search: SearchServiceImpl::new(Arc::new(YtDlpSearcher::new(config.yt_dlp_path.clone()))),
        health: health.clone(),
    };
    let (_addr, server_task) = spawn_grpc_server(config.grpc_addr(), services, shutdown.clone()).await?;
    health.set_serving(true);

    // 4) Tell the controller we are up. Advisory only.
    {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            if let Err(e) = lifecycle.notify_ready().await {
                warn!("Failed to notify controller of readiness: {}", e);
            }
        });
    }

    // 5) Termination signals go through the same graceful path as inactivity.
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            wait_for_termination().await;
            info!("Termination signal received, shutting down");
            engine.graceful_shutdown("signal").await;
        });
    }

    let engine_task = tokio::spawn(engine.run(sink_rx));

    let code = shutdown.wait().await;
    health.set_serving(false);
    if let Err(e) = engine_task.await {
        error!("Playback engine task failed: {:?}", e);
    }
    if let Err(e) = server_task.await {
        error!("gRPC server task failed: {:?}", e);
    }
    Ok(code)
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
