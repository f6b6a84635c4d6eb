//! Worker side of the lifecycle handshake with the controller.
//!
//! Both calls are idempotent and carry a bounded deadline, so a stuck
//! controller can never hold up process exit.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use auxbot_common::Error;
use auxbot_proto::auxbot::lifecycle::worker_lifecycle_client::WorkerLifecycleClient;
use auxbot_proto::auxbot::lifecycle::{WorkerLifecycleRequest, WorkerReadyRequest};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    /// Tell the controller this worker joined its channel and is serving.
    async fn notify_ready(&self) -> Result<bool, Error>;

    /// Tell the controller this worker is about to exit.
    async fn notify_shutdown(&self, reason: &str) -> Result<bool, Error>;
}

pub struct GrpcLifecycleClient {
    endpoint: Endpoint,
    guild_id: String,
    deadline: Duration,
}

impl GrpcLifecycleClient {
    pub fn new(controller_addr: &str, guild_id: impl Into<String>, deadline: Duration) -> Result<Self, Error> {
        let endpoint = Channel::from_shared(controller_addr.to_string())?
            .connect_timeout(deadline)
            .timeout(deadline);
        Ok(Self {
            endpoint,
            guild_id: guild_id.into(),
            deadline,
        })
    }

    async fn client(&self) -> Result<WorkerLifecycleClient<Channel>, Error> {
        let channel = self.endpoint.connect().await?;
        Ok(WorkerLifecycleClient::new(channel))
    }
}

#[async_trait]
impl LifecycleNotifier for GrpcLifecycleClient {
    async fn notify_ready(&self) -> Result<bool, Error> {
        let request = WorkerReadyRequest {
            guild_id: self.guild_id.clone(),
        };
        let acknowledged = tokio::time::timeout(self.deadline, async {
            let mut client = self.client().await?;
            let resp = client.notify_ready(request).await?;
            Ok::<_, Error>(resp.into_inner().acknowledged)
        })
        .await??;

        info!("Controller acknowledged readiness: {}", acknowledged);
        Ok(acknowledged)
    }

    async fn notify_shutdown(&self, reason: &str) -> Result<bool, Error> {
        let request = WorkerLifecycleRequest {
            guild_id: self.guild_id.clone(),
            reason: reason.to_string(),
        };
        let acknowledged = tokio::time::timeout(self.deadline, async {
            let mut client = self.client().await?;
            let resp = client.notify_shutdown(request).await?;
            Ok::<_, Error>(resp.into_inner().acknowledged)
        })
        .await??;

        if !acknowledged {
            warn!("Controller did not acknowledge shutdown (reason={})", reason);
        }
        Ok(acknowledged)
    }
}
