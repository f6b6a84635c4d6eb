use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tonic::{Request, Response, Status};
use tracing::debug;

use auxbot_proto::auxbot::health::health_check_response::ServingStatus;
use auxbot_proto::auxbot::health::health_check_server::HealthCheck;
use auxbot_proto::auxbot::health::{HealthCheckRequest, HealthCheckResponse};

/// Reports SERVING once the worker has joined voice and its Player service
/// is up. Before that, NOT_SERVING.
#[derive(Clone, Default)]
pub struct HealthServiceImpl {
    serving: Arc<AtomicBool>,
}

impl HealthServiceImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::SeqCst);
    }
}

#[tonic::async_trait]
impl HealthCheck for HealthServiceImpl {
    async fn check(&self, request: Request<HealthCheckRequest>) -> Result<Response<HealthCheckResponse>, Status> {
        debug!("Health check requested for service: {}", request.get_ref().service);
        let status = if self.serving.load(Ordering::SeqCst) {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        };
        Ok(Response::new(HealthCheckResponse { status: status as i32 }))
    }
}
