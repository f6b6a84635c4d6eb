use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use auxbot_common::traits::{ErrorReporter, ErrorTags, TracingReporter};
use auxbot_common::ShutdownSignal;
use auxbot_controller::cluster::{ClusterApi, KubeClient};
use auxbot_controller::grpc_services::WorkerLifecycleServiceImpl;
use auxbot_controller::health::GrpcHealthProber;
use auxbot_controller::http_api::{spawn_http_server, ApiState};
use auxbot_controller::server::spawn_grpc_server;
use auxbot_controller::worker_client::WorkerClient;
use auxbot_controller::{ControllerConfig, WorkerRegistry};

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
    let config = ControllerConfig::parse();
    info!(
        "auxbot controller starting. namespace={}, image={}, grpc_port={}, http_port={}",
        config.k8s_namespace, config.worker_image, config.grpc_port, config.http_port
    );

    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter);
    let cluster: Arc<dyn ClusterApi> = match &config.kube_api_url {
        Some(url) => {
            info!("Using cluster API at {}", url);
            Arc::new(KubeClient::new(
                reqwest::Client::new(),
                url.clone(),
                config.k8s_namespace.clone(),
                None,
            ))
        }
        None => Arc::new(KubeClient::in_cluster(config.k8s_namespace.clone())?),
    };

    let registry = Arc::new(WorkerRegistry::new(
        cluster,
        Arc::new(GrpcHealthProber::new(config.health_check_timeout())),
        reporter.clone(),
        config.registry_config(),
    ));

    // Pick up workers left behind by a previous controller.
    match registry.load_existing_workers().await {
        Ok(n) => info!("Loaded {} existing workers", n),
        Err(e) => reporter.report(&e, &ErrorTags::new("controller", "loadExistingWorkers")),
    }

    let shutdown = ShutdownSignal::new();

    let (_grpc_addr, grpc_task) = spawn_grpc_server(
        config.grpc_addr(),
        WorkerLifecycleServiceImpl::new(registry.clone()),
        shutdown.clone(),
    )
    .await?;

    let api_state = ApiState {
        registry: registry.clone(),
        workers: WorkerClient::for_namespace(
            config.k8s_namespace.clone(),
            config.worker_grpc_port,
            config.health_check_timeout(),
            reporter.clone(),
        ),
    };
    let (_http_addr, http_task) = spawn_http_server(config.http_addr(), api_state, shutdown.clone()).await?;

    let sweep_task = registry
        .clone()
        .spawn_health_checks(config.health_check_interval(), shutdown.clone());
    info!(
        "Health checks running every {}s",
        config.health_check_interval().as_secs()
    );

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_termination().await;
            info!("Termination signal received, shutting down");
            shutdown.trigger(0);
        });
    }

    let code = shutdown.wait().await;
    for (name, task) in [("health check", sweep_task), ("gRPC server", grpc_task), ("operator API", http_task)] {
        if let Err(e) = task.await {
            error!("{} task failed: {:?}", name, e);
        }
    }
    info!("Controller exiting with code {}", code);
    std::process::exit(code);
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
