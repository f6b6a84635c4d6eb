// Shared fixtures for the controller integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use auxbot_common::traits::TracingReporter;
use auxbot_common::Error;
use auxbot_controller::cluster::{ClusterApi, ObjectMeta, Pod, Service};
use auxbot_controller::health::HealthProber;
use auxbot_controller::provisioner::WorkerTemplate;
use auxbot_controller::registry::{RegistryConfig, WorkerRegistry};

/// In-memory namespace. Creates are slow enough to interleave with each
/// other, names conflict like the real API server, and deletes of missing
/// objects succeed.
#[derive(Default)]
pub struct FakeCluster {
    pub pods: Mutex<BTreeMap<String, Pod>>,
    pub services: Mutex<BTreeMap<String, Service>>,
    pub pod_creates: AtomicUsize,
    pub fail_service_create: AtomicBool,
    pub fail_service_delete: AtomicBool,
    pub create_delay: Duration,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            create_delay: Duration::from_millis(20),
            ..Default::default()
        }
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.pods.lock().unwrap().keys().cloned().collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.lock().unwrap().keys().cloned().collect()
    }

    pub fn insert_pod(&self, pod: Pod) {
        let name = pod.name().unwrap().to_string();
        self.pods.lock().unwrap().insert(name, pod);
    }

    pub fn insert_service(&self, service: Service) {
        let name = service.name().unwrap().to_string();
        self.services.lock().unwrap().insert(name, service);
    }
}

fn matches_selector(meta: &ObjectMeta, selector: &str) -> bool {
    selector
        .split(',')
        .filter_map(|clause| clause.split_once('='))
        .all(|(k, v)| meta.label(k) == Some(v))
}

fn conflict(name: &str) -> Error {
    Error::Cluster {
        status: 409,
        message: format!("\"{}\" already exists", name),
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_pod(&self, pod: &Pod) -> Result<Pod, Error> {
        self.pod_creates.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.create_delay).await;
        let name = pod.name().unwrap_or_default().to_string();
        let mut pods = self.pods.lock().unwrap();
        if pods.contains_key(&name) {
            return Err(conflict(&name));
        }
        let mut created = pod.clone();
        created.metadata.uid = Some(format!("uid-{name}"));
        pods.insert(name, created.clone());
        Ok(created)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, Error> {
        if self.fail_service_create.load(Ordering::SeqCst) {
            return Err(Error::Cluster {
                status: 500,
                message: "admission webhook timed out".into(),
            });
        }
        let name = service.name().unwrap_or_default().to_string();
        let mut services = self.services.lock().unwrap();
        if services.contains_key(&name) {
            return Err(conflict(&name));
        }
        services.insert(name, service.clone());
        Ok(service.clone())
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .values()
            .filter(|p| matches_selector(&p.metadata, label_selector))
            .cloned()
            .collect())
    }

    async fn list_services(&self, label_selector: &str) -> Result<Vec<Service>, Error> {
        Ok(self
            .services
            .lock()
            .unwrap()
            .values()
            .filter(|s| matches_selector(&s.metadata, label_selector))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, name: &str) -> Result<(), Error> {
        self.pods.lock().unwrap().remove(name);
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> Result<(), Error> {
        if self.fail_service_delete.load(Ordering::SeqCst) {
            return Err(Error::Cluster {
                status: 500,
                message: "etcdserver: request timed out".into(),
            });
        }
        self.services.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Answers SERVING for every address.
pub struct AlwaysHealthy;

#[async_trait]
impl HealthProber for AlwaysHealthy {
    async fn probe(&self, _address: &str) -> Result<bool, Error> {
        Ok(true)
    }
}

pub fn template() -> WorkerTemplate {
    WorkerTemplate {
        namespace: "auxbot".into(),
        image: "ghcr.io/dumspy/auxbot-worker:latest".into(),
        discord_token: "token".into(),
        discord_client_id: "client".into(),
        grpc_port: 50051,
        inactivity_timeout_minutes: 20,
        controller_addr: None,
    }
}

pub fn registry_with(cluster: Arc<FakeCluster>, prober: Arc<dyn HealthProber>) -> Arc<WorkerRegistry> {
    Arc::new(WorkerRegistry::new(
        cluster,
        prober,
        Arc::new(TracingReporter),
        RegistryConfig {
            template: template(),
            health_check_timeout: Duration::from_secs(5),
            unhealthy_threshold: 3,
        },
    ))
}

pub fn labeled_pod(name: &str, labels: &[(&str, &str)]) -> Pod {
    let mut meta = ObjectMeta {
        name: Some(name.into()),
        uid: Some(format!("uid-{name}")),
        ..Default::default()
    };
    for (k, v) in labels {
        meta.labels.insert(k.to_string(), v.to_string());
    }
    Pod {
        metadata: meta,
        ..Default::default()
    }
}

pub fn labeled_service(name: &str, labels: &[(&str, &str)]) -> Service {
    let mut meta = ObjectMeta {
        name: Some(name.into()),
        ..Default::default()
    };
    for (k, v) in labels {
        meta.labels.insert(k.to_string(), v.to_string());
    }
    Service {
        metadata: meta,
        ..Default::default()
    }
}
