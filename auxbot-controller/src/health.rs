//! Worker liveness probing over the HealthCheck RPC.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tracing::debug;

use auxbot_common::Error;
use auxbot_proto::auxbot::health::health_check_client::HealthCheckClient;
use auxbot_proto::auxbot::health::health_check_response::ServingStatus;
use auxbot_proto::auxbot::health::HealthCheckRequest;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// `Ok(true)` only for SERVING. Transport failures are `Err`.
    async fn probe(&self, address: &str) -> Result<bool, Error>;
}

pub struct GrpcHealthProber {
    timeout: Duration,
}

impl GrpcHealthProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HealthProber for GrpcHealthProber {
    async fn probe(&self, address: &str) -> Result<bool, Error> {
        let channel = Endpoint::from_shared(address.to_string())?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await?;
        let resp = HealthCheckClient::new(channel)
            .check(HealthCheckRequest {
                service: "worker".to_string(),
            })
            .await?
            .into_inner();

        let healthy = resp.status() == ServingStatus::Serving;
        debug!("Health check for {}: {}", address, if healthy { "HEALTHY" } else { "UNHEALTHY" });
        Ok(healthy)
    }
}
