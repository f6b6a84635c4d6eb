//! Builds the compute unit (Pod) and network endpoint (Service) for a new
//! worker. Pure: no cluster calls happen here.

use std::collections::BTreeMap;

use uuid::Uuid;

use auxbot_common::models::labels::{self, APP_LABEL, APP_WORKER, GUILD_LABEL, LABEL_SCHEMA_VERSION, SCHEMA_LABEL};
use auxbot_common::Error;

use crate::cluster::models::{
    Container, ContainerPort, EnvVar, ObjectMeta, OwnerReference, Pod, PodSpec, Service, ServicePort, ServiceSpec,
};

const NAME_PREFIX: &str = "auxbot-worker";

/// Everything about a worker pod that does not depend on the tenant.
#[derive(Debug, Clone)]
pub struct WorkerTemplate {
    pub namespace: String,
    pub image: String,
    pub discord_token: String,
    pub discord_client_id: String,
    pub grpc_port: u16,
    pub inactivity_timeout_minutes: u64,
    /// Lifecycle endpoint handed to workers as `CONTROLLER_ADDR`.
    pub controller_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerResources {
    pub pod: Pod,
    pub service: Service,
}

/// One per tenant, so a second create for the same tenant conflicts instead
/// of producing a second endpoint.
pub fn service_name(guild_id: &str) -> String {
    format!("{NAME_PREFIX}-{guild_id}")
}

/// In-cluster gRPC address of a worker's network endpoint.
pub fn service_address(service_name: &str, namespace: &str, port: u16) -> String {
    format!("http://{service_name}.{namespace}.svc.cluster.local:{port}")
}

fn pod_name(guild_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{NAME_PREFIX}-{guild_id}-{}", &suffix[..8])
}

fn service_labels(guild_id: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.to_string(), APP_WORKER.to_string());
    labels.insert(GUILD_LABEL.to_string(), guild_id.to_string());
    labels.insert(SCHEMA_LABEL.to_string(), LABEL_SCHEMA_VERSION.to_string());
    labels
}

pub fn build_worker_resources(template: &WorkerTemplate, guild_id: &str, channel_id: &str) -> WorkerResources {
    let pod_name = pod_name(guild_id);
    let port = i32::from(template.grpc_port);

    let mut env = vec![
        EnvVar::new("DISCORD_TOKEN", template.discord_token.clone()),
        EnvVar::new("DISCORD_CLIENT_ID", template.discord_client_id.clone()),
        EnvVar::new("DISCORD_GUILD_ID", guild_id),
        EnvVar::new("DISCORD_CHANNEL_ID", channel_id),
        EnvVar::new("GRPC_PORT", template.grpc_port.to_string()),
        EnvVar::new("INACTIVITY_TIMEOUT_MINUTES", template.inactivity_timeout_minutes.to_string()),
    ];
    if let Some(addr) = &template.controller_addr {
        env.push(EnvVar::new("CONTROLLER_ADDR", addr.clone()));
    }

    let pod = Pod {
        api_version: "v1".into(),
        kind: "Pod".into(),
        metadata: ObjectMeta {
            name: Some(pod_name.clone()),
            namespace: Some(template.namespace.clone()),
            labels: labels::worker_labels(guild_id, channel_id),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "worker".into(),
                image: template.image.clone(),
                image_pull_policy: Some("Always".into()),
                env,
                ports: vec![ContainerPort {
                    container_port: port,
                    name: Some("grpc".into()),
                    protocol: Some("TCP".into()),
                }],
            }],
            restart_policy: Some("Never".into()),
        }),
        status: None,
    };

    let mut selector = BTreeMap::new();
    selector.insert(APP_LABEL.to_string(), APP_WORKER.to_string());
    selector.insert(GUILD_LABEL.to_string(), guild_id.to_string());

    let service = Service {
        api_version: "v1".into(),
        kind: "Service".into(),
        metadata: ObjectMeta {
            name: Some(service_name(guild_id)),
            namespace: Some(template.namespace.clone()),
            labels: service_labels(guild_id),
            owner_references: vec![OwnerReference {
                api_version: "v1".into(),
                kind: "Pod".into(),
                name: pod_name,
                uid: String::new(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            }],
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector,
            ports: vec![ServicePort {
                name: Some("grpc".into()),
                port,
                target_port: Some(port),
                protocol: Some("TCP".into()),
            }],
            type_: Some("ClusterIP".into()),
        }),
    };

    WorkerResources { pod, service }
}

/// Points the service's owner reference at the created pod. The uid only
/// exists after the pod has been accepted by the API server.
pub fn bind_service_owner(service: &mut Service, pod: &Pod) -> Result<(), Error> {
    let uid = pod
        .metadata
        .uid
        .as_deref()
        .ok_or_else(|| Error::Provisioning("created pod has no uid".into()))?;
    let owner = service
        .metadata
        .owner_references
        .first_mut()
        .ok_or_else(|| Error::Provisioning("service descriptor has no owner reference".into()))?;
    owner.uid = uid.to_string();
    if let Some(name) = pod.name() {
        owner.name = name.to_string();
    }
    Ok(())
}
