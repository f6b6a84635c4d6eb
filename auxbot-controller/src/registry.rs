//! auxbot-controller/src/registry.rs
//!
//! Authoritative map of tracked workers, keyed by pod name. All cluster
//! mutations for a tenant go through here:
//!
//! - `provision_worker` is the only way to create a worker. Lookup and
//!   create happen under one lock, so two concurrent requests for the same
//!   tenant yield one pod.
//! - `cleanup_worker` attempts every delete step and always drops the map
//!   entry, then reports the first failure.
//! - The health sweep probes every worker with its own deadline; one bad
//!   worker never stops the sweep over the rest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use auxbot_common::models::labels::{self, CHANNEL_LABEL, GUILD_LABEL, LABEL_SCHEMA_VERSION, SCHEMA_LABEL};
use auxbot_common::traits::{ErrorReporter, ErrorTags};
use auxbot_common::{Error, ShutdownSignal};

use crate::cluster::{ClusterApi, Pod, Service};
use crate::health::HealthProber;
use crate::provisioner::{bind_service_owner, build_worker_resources, service_address, WorkerResources, WorkerTemplate};

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub template: WorkerTemplate,
    /// Deadline for a single health probe.
    pub health_check_timeout: Duration,
    /// Consecutive failed probes after which a worker is reclaimed.
    pub unhealthy_threshold: u32,
}

#[derive(Debug, Clone)]
pub struct TrackedWorker {
    pub pod: Pod,
    pub service: Service,
    pub guild_id: String,
    pub channel_id: String,
    pub healthy: bool,
    /// Set by the worker's readiness notification. Informational only.
    pub ready: bool,
    pub consecutive_failures: u32,
    pub last_checked: DateTime<Utc>,
}

impl TrackedWorker {
    fn new(pod: Pod, service: Service, guild_id: &str, channel_id: &str) -> Self {
        Self {
            pod,
            service,
            guild_id: guild_id.to_string(),
            channel_id: channel_id.to_string(),
            healthy: false,
            ready: false,
            consecutive_failures: 0,
            last_checked: Utc::now(),
        }
    }

    pub fn pod_name(&self) -> &str {
        self.pod.name().unwrap_or("unknown")
    }

    pub fn service_name(&self) -> &str {
        self.service.name().unwrap_or("unknown")
    }
}

/// What the operator API shows for a tracked worker.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub pod_name: String,
    pub service_name: String,
    pub guild_id: String,
    pub channel_id: String,
    pub healthy: bool,
    pub ready: bool,
    pub last_checked: DateTime<Utc>,
}

impl From<&TrackedWorker> for WorkerSummary {
    fn from(w: &TrackedWorker) -> Self {
        Self {
            pod_name: w.pod_name().to_string(),
            service_name: w.service_name().to_string(),
            guild_id: w.guild_id.clone(),
            channel_id: w.channel_id.clone(),
            healthy: w.healthy,
            ready: w.ready,
            last_checked: w.last_checked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioned {
    pub pod_name: String,
    /// False when an existing worker for the tenant was returned.
    pub created: bool,
}

pub struct WorkerRegistry {
    cluster: Arc<dyn ClusterApi>,
    prober: Arc<dyn HealthProber>,
    reporter: Arc<dyn ErrorReporter>,
    config: RegistryConfig,
    workers: Mutex<HashMap<String, TrackedWorker>>,
    /// Serializes lookup-or-create, reclamation and reconciliation.
    provision_lock: Mutex<()>,
}

impl WorkerRegistry {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        prober: Arc<dyn HealthProber>,
        reporter: Arc<dyn ErrorReporter>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            cluster,
            prober,
            reporter,
            config,
            workers: Mutex::new(HashMap::new()),
            provision_lock: Mutex::new(()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.template.namespace
    }

    /// gRPC address of a tracked worker, resolved through its service.
    pub fn worker_address(&self, worker: &TrackedWorker) -> String {
        service_address(worker.service_name(), self.namespace(), self.config.template.grpc_port)
    }

    fn report(&self, err: &Error, operation: &'static str, guild_id: &str, pod_name: Option<&str>) {
        let mut tags = ErrorTags::new("registry", operation).tenant(guild_id.to_string());
        if let Some(pod) = pod_name {
            tags = tags.with("podName", pod.to_string());
        }
        self.reporter.report(err, &tags);
    }

    // ---------------------------------------------------------------
    // Provisioning
    // ---------------------------------------------------------------

    /// Returns the tenant's existing worker, or creates one.
    pub async fn provision_worker(&self, guild_id: &str, channel_id: &str) -> Result<Provisioned, Error> {
        let _guard = self.provision_lock.lock().await;

        if let Some(existing) = self.find_by_tenant(guild_id).await {
            info!("Using existing worker for guild {}: {}", guild_id, existing.pod_name());
            return Ok(Provisioned {
                pod_name: existing.pod_name().to_string(),
                created: false,
            });
        }

        let WorkerResources { pod, mut service } = build_worker_resources(&self.config.template, guild_id, channel_id);

        let created_pod = self.cluster.create_pod(&pod).await.map_err(|e| {
            let err = Error::Provisioning(format!("failed to create pod for guild {}: {}", guild_id, e));
            self.report(&err, "createPod", guild_id, pod.name());
            err
        })?;
        let pod_name = created_pod
            .name()
            .or(pod.name())
            .unwrap_or("unknown")
            .to_string();

        // From here on a failure leaves an orphaned pod behind; reconciliation
        // removes it on a later sweep.
        if let Err(e) = bind_service_owner(&mut service, &created_pod) {
            self.report(&e, "bindOwner", guild_id, Some(&pod_name));
            return Err(e);
        }
        if let Err(e) = self.cluster.create_service(&service).await {
            let err = Error::Provisioning(format!("failed to create service for pod {}: {}", pod_name, e));
            warn!("Pod {} has no service and is now an orphan", pod_name);
            self.report(&err, "createService", guild_id, Some(&pod_name));
            return Err(err);
        }

        info!("Worker pod created: {} for guild: {}, channel: {}", pod_name, guild_id, channel_id);
        self.register_worker(created_pod, guild_id, channel_id).await?;

        Ok(Provisioned { pod_name, created: true })
    }

    /// Tracks `pod` after locating the service provisioning created for its
    /// tenant. Never tracks a worker without a service.
    pub async fn register_worker(&self, pod: Pod, guild_id: &str, channel_id: &str) -> Result<(), Error> {
        let pod_name = pod.name().unwrap_or("unknown").to_string();
        let service = self.find_service(guild_id).await.and_then(|svc| {
            svc.ok_or_else(|| {
                Error::Registration(format!("No service found for worker {} (guild: {})", pod_name, guild_id))
            })
        });
        let service = match service {
            Ok(s) => s,
            Err(e) => {
                let err = match e {
                    Error::Registration(_) => e,
                    other => Error::Registration(other.to_string()),
                };
                self.report(&err, "registerWorker", guild_id, Some(&pod_name));
                return Err(err);
            }
        };

        info!(
            "Registered worker pod {} and service {} for guild {}, channel {}",
            pod_name,
            service.name().unwrap_or("unknown"),
            guild_id,
            channel_id
        );
        self.workers
            .lock()
            .await
            .insert(pod_name, TrackedWorker::new(pod, service, guild_id, channel_id));
        Ok(())
    }

    async fn find_service(&self, guild_id: &str) -> Result<Option<Service>, Error> {
        let services = self.cluster.list_services(&labels::tenant_selector(guild_id)).await?;
        Ok(services.into_iter().find(|s| !s.metadata.is_terminating()))
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub async fn get_worker(&self, pod_name: &str) -> Option<TrackedWorker> {
        self.workers.lock().await.get(pod_name).cloned()
    }

    /// Zero or one entries in practice.
    pub async fn get_workers_by_tenant(&self, guild_id: &str) -> Vec<TrackedWorker> {
        self.workers
            .lock()
            .await
            .values()
            .filter(|w| w.guild_id == guild_id)
            .cloned()
            .collect()
    }

    pub async fn find_by_tenant(&self, guild_id: &str) -> Option<TrackedWorker> {
        self.get_workers_by_tenant(guild_id).await.into_iter().next()
    }

    pub async fn get_all_workers(&self) -> Vec<TrackedWorker> {
        self.workers.lock().await.values().cloned().collect()
    }

    pub async fn unregister_worker(&self, pod_name: &str) {
        if self.workers.lock().await.remove(pod_name).is_some() {
            info!("Unregistered worker pod {}", pod_name);
        }
    }

    /// Returns false if no worker is tracked for the tenant.
    pub async fn mark_ready(&self, guild_id: &str) -> bool {
        let mut workers = self.workers.lock().await;
        match workers.values_mut().find(|w| w.guild_id == guild_id) {
            Some(worker) => {
                worker.ready = true;
                info!("Worker {} for guild {} reported ready", worker.pod_name(), guild_id);
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------
    // Reclamation
    // ---------------------------------------------------------------

    pub async fn cleanup_worker(&self, pod_name: &str) -> Result<(), Error> {
        let _guard = self.provision_lock.lock().await;

        let worker = self
            .get_worker(pod_name)
            .await
            .ok_or_else(|| Error::NotFound(format!("Worker {} not found for cleanup", pod_name)))?;
        let guild_id = worker.guild_id.as_str();

        let mut first_failure: Option<Error> = None;
        if let Err(e) = self.cluster.delete_pod(pod_name).await {
            self.report(&e, "deletePod", guild_id, Some(pod_name));
            first_failure.get_or_insert(e);
        }
        if let Err(e) = self.cluster.delete_service(worker.service_name()).await {
            self.report(&e, "deleteService", guild_id, Some(pod_name));
            first_failure.get_or_insert(e);
        }
        self.unregister_worker(pod_name).await;

        match first_failure {
            None => {
                info!("Cleaned up resources for worker {}", pod_name);
                Ok(())
            }
            Some(e) => {
                error!("Error cleaning up worker {}: {}", pod_name, e);
                Err(Error::Reclamation {
                    worker: pod_name.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    // ---------------------------------------------------------------
    // Health
    // ---------------------------------------------------------------

    async fn probe(&self, worker: &TrackedWorker) -> bool {
        let address = self.worker_address(worker);
        let pod_name = worker.pod_name();
        match tokio::time::timeout(self.config.health_check_timeout, self.prober.probe(&address)).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                self.report(&e, "healthCheck", &worker.guild_id, Some(pod_name));
                false
            }
            Err(elapsed) => {
                self.report(&Error::Timeout(elapsed), "healthCheck", &worker.guild_id, Some(pod_name));
                false
            }
        }
    }

    /// Applies one probe result. Returns true when the worker crossed the
    /// unhealthy threshold.
    async fn record_health(&self, pod_name: &str, healthy: bool) -> bool {
        let mut workers = self.workers.lock().await;
        let Some(worker) = workers.get_mut(pod_name) else {
            // Reclaimed while the probe was in flight.
            return false;
        };
        worker.healthy = healthy;
        worker.last_checked = Utc::now();
        worker.consecutive_failures = if healthy { 0 } else { worker.consecutive_failures + 1 };
        info!(
            "Health check for worker {}: {}",
            pod_name,
            if healthy { "HEALTHY" } else { "UNHEALTHY" }
        );
        worker.consecutive_failures >= self.config.unhealthy_threshold
    }

    pub async fn check_worker_health(&self, pod_name: &str) -> bool {
        let Some(worker) = self.get_worker(pod_name).await else {
            warn!("Worker {} not found for health check", pod_name);
            return false;
        };
        let healthy = self.probe(&worker).await;
        self.record_health(pod_name, healthy).await;
        healthy
    }

    /// Probes every tracked worker concurrently, then reclaims workers that
    /// have failed too many probes in a row. Returns the number probed.
    pub async fn run_health_sweep(&self) -> usize {
        let targets = self.get_all_workers().await;
        let results = join_all(targets.iter().map(|w| async move { (w.pod_name(), self.probe(w).await) })).await;

        let mut dead = Vec::new();
        for (pod_name, healthy) in &results {
            if self.record_health(pod_name, *healthy).await {
                dead.push(pod_name.to_string());
            }
        }

        for pod_name in dead {
            warn!("Worker {} failed {} health checks in a row, reclaiming", pod_name, self.config.unhealthy_threshold);
            if let Err(e) = self.cleanup_worker(&pod_name).await {
                debug!("Reclaiming unhealthy worker {} failed: {}", pod_name, e);
            }
        }
        results.len()
    }

    pub fn spawn_health_checks(self: Arc<Self>, interval: Duration, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_health_sweep().await;
                        self.reconcile_orphans().await;
                    }
                    _ = shutdown.wait() => {
                        info!("Health check loop stopped");
                        break;
                    }
                }
            }
        })
    }

    // ---------------------------------------------------------------
    // Rehydration / reconciliation
    // ---------------------------------------------------------------

    /// Rebuilds the map from worker pods already in the namespace. Pods
    /// missing tenant labels, or without a service, are logged and skipped.
    pub async fn load_existing_workers(&self) -> Result<usize, Error> {
        let pods = self.cluster.list_pods(&labels::worker_selector()).await?;
        info!("Found {} worker pods in cluster", pods.len());

        let mut loaded = 0;
        for pod in pods {
            let Some(pod_name) = pod.name().map(str::to_string) else {
                continue;
            };
            if pod.metadata.is_terminating() || self.get_worker(&pod_name).await.is_some() {
                continue;
            }
            let (Some(guild_id), Some(channel_id)) = (
                pod.metadata.label(GUILD_LABEL).map(str::to_string),
                pod.metadata.label(CHANNEL_LABEL).map(str::to_string),
            ) else {
                warn!("Found worker pod {} without guild ID or channel ID labels", pod_name);
                continue;
            };
            match pod.metadata.label(SCHEMA_LABEL) {
                Some(LABEL_SCHEMA_VERSION) => {}
                other => warn!(
                    "Worker pod {} has label schema {:?}, expected {}",
                    pod_name, other, LABEL_SCHEMA_VERSION
                ),
            }

            let service = match self.find_service(&guild_id).await {
                Ok(Some(s)) => s,
                Ok(None) => {
                    warn!("No service found for worker {} (guild: {})", pod_name, guild_id);
                    continue;
                }
                Err(e) => {
                    self.report(&e, "loadExistingWorkers", &guild_id, Some(&pod_name));
                    continue;
                }
            };

            info!(
                "Loaded existing worker pod {} and service {} for guild {}, channel {}",
                pod_name,
                service.name().unwrap_or("unknown"),
                guild_id,
                channel_id
            );
            self.workers
                .lock()
                .await
                .insert(pod_name, TrackedWorker::new(pod, service, &guild_id, &channel_id));
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Deletes labeled worker pods the registry does not track and cannot
    /// adopt: leftovers of a provisioning attempt that failed after the pod
    /// was created, or duplicates for a tenant that already has a worker.
    /// Pods missing either tenant label are left for manual cleanup.
    pub async fn reconcile_orphans(&self) -> usize {
        let _guard = self.provision_lock.lock().await;

        let pods = match self.cluster.list_pods(&labels::worker_selector()).await {
            Ok(p) => p,
            Err(e) => {
                self.reporter.report(&e, &ErrorTags::new("registry", "reconcileOrphans"));
                return 0;
            }
        };

        let mut removed = 0;
        for pod in pods {
            let Some(pod_name) = pod.name().map(str::to_string) else {
                continue;
            };
            if pod.metadata.is_terminating() || self.get_worker(&pod_name).await.is_some() {
                continue;
            }
            let (Some(guild_id), Some(channel_id)) = (
                pod.metadata.label(GUILD_LABEL).map(str::to_string),
                pod.metadata.label(CHANNEL_LABEL).map(str::to_string),
            ) else {
                debug!("Skipping worker pod {} without tenant labels", pod_name);
                continue;
            };

            let tenant_tracked = self.find_by_tenant(&guild_id).await.is_some();
            if !tenant_tracked {
                if let Ok(Some(_)) = self.find_service(&guild_id).await {
                    if self.register_worker(pod, &guild_id, &channel_id).await.is_ok() {
                        info!("Adopted untracked worker pod {}", pod_name);
                    }
                    continue;
                }
            }

            warn!("Deleting orphaned worker pod {} (guild {})", pod_name, guild_id);
            match self.cluster.delete_pod(&pod_name).await {
                Ok(()) => removed += 1,
                Err(e) => self.report(&e, "reconcileOrphans", &guild_id, Some(&pod_name)),
            }
        }
        removed
    }
}
