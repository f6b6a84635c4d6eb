//! Cluster API boundary.
//!
//! The registry only ever needs six namespaced calls, so they sit behind
//! [`ClusterApi`] and the production implementation talks to the Kubernetes
//! REST API directly.

pub mod kube_client;
pub mod models;

use async_trait::async_trait;

use auxbot_common::Error;

pub use kube_client::KubeClient;
pub use models::{ObjectMeta, OwnerReference, Pod, Service};

/// Namespaced core/v1 operations. The namespace is fixed by the
/// implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_pod(&self, pod: &Pod) -> Result<Pod, Error>;
    async fn create_service(&self, service: &Service) -> Result<Service, Error>;
    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error>;
    async fn list_services(&self, label_selector: &str) -> Result<Vec<Service>, Error>;
    /// Deleting an object that is already gone succeeds.
    async fn delete_pod(&self, name: &str) -> Result<(), Error>;
    /// Deleting an object that is already gone succeeds.
    async fn delete_service(&self, name: &str) -> Result<(), Error>;
}
