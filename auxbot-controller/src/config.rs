//! Controller settings, from flags or the environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::provisioner::WorkerTemplate;
use crate::registry::RegistryConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "auxbot-controller")]
#[command(author, version, about = "auxbot controller - provisions and tracks per-guild workers")]
pub struct ControllerConfig {
    /// Namespace the worker pods and services live in.
    #[arg(long, env = "K8S_NAMESPACE", default_value = "default")]
    pub k8s_namespace: String,

    /// API server root. Defaults to the in-cluster service account setup.
    #[arg(long, env = "KUBE_API_URL")]
    pub kube_api_url: Option<String>,

    #[arg(long, env = "WORKER_IMAGE", default_value = "ghcr.io/dumspy/auxbot-worker:latest")]
    pub worker_image: String,

    /// Forwarded to every worker pod.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    #[arg(long, env = "DISCORD_CLIENT_ID", default_value = "")]
    pub discord_client_id: String,

    /// Port the workers serve Player/Search/Health on.
    #[arg(long, env = "WORKER_GRPC_PORT", default_value_t = 50051)]
    pub worker_grpc_port: u16,

    /// Port of the WorkerLifecycle server.
    #[arg(long, env = "GRPC_PORT", default_value_t = 50051)]
    pub grpc_port: u16,

    /// Port of the operator HTTP API.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub http_port: u16,

    #[arg(long, env = "HEALTH_CHECK_INTERVAL_SECS", default_value_t = 30)]
    pub health_check_interval_secs: u64,

    #[arg(long, env = "HEALTH_CHECK_TIMEOUT_SECS", default_value_t = 5)]
    pub health_check_timeout_secs: u64,

    #[arg(long, env = "UNHEALTHY_THRESHOLD", default_value_t = 5)]
    pub unhealthy_threshold: u32,

    #[arg(long, env = "INACTIVITY_TIMEOUT_MINUTES", default_value_t = 20)]
    pub inactivity_timeout_minutes: u64,

    /// Lifecycle address handed to workers as CONTROLLER_ADDR.
    #[arg(long, env = "CONTROLLER_SERVICE_ADDR")]
    pub controller_service_addr: Option<String>,
}

impl ControllerConfig {
    pub fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.grpc_port))
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn worker_template(&self) -> WorkerTemplate {
        WorkerTemplate {
            namespace: self.k8s_namespace.clone(),
            image: self.worker_image.clone(),
            discord_token: self.discord_token.clone(),
            discord_client_id: self.discord_client_id.clone(),
            grpc_port: self.worker_grpc_port,
            inactivity_timeout_minutes: self.inactivity_timeout_minutes,
            controller_addr: self.controller_service_addr.clone(),
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            template: self.worker_template(),
            health_check_timeout: self.health_check_timeout(),
            // Zero would reclaim on the first failed probe of a starting pod.
            unhealthy_threshold: self.unhealthy_threshold.max(1),
        }
    }
}
