// File: auxbot-controller/src/grpc_services/lifecycle_service.rs

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{info, warn};

use auxbot_proto::auxbot::lifecycle::worker_lifecycle_server::WorkerLifecycle;
use auxbot_proto::auxbot::lifecycle::{WorkerLifecycleRequest, WorkerLifecycleResponse, WorkerReadyRequest};

use crate::registry::WorkerRegistry;

pub struct WorkerLifecycleServiceImpl {
    registry: Arc<WorkerRegistry>,
}

impl WorkerLifecycleServiceImpl {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl WorkerLifecycle for WorkerLifecycleServiceImpl {
    /// Reclaims the tenant's worker. Acknowledged only when every delete
    /// step succeeded; a retry after a partial failure finds nothing tracked
    /// and is answered with `false`.
    async fn notify_shutdown(
        &self,
        request: Request<WorkerLifecycleRequest>,
    ) -> Result<Response<WorkerLifecycleResponse>, Status> {
        let req = request.into_inner();
        info!("Worker for guild {} is shutting down. Reason: {}", req.guild_id, req.reason);

        let Some(worker) = self.registry.find_by_tenant(&req.guild_id).await else {
            warn!("No worker found for guild {}", req.guild_id);
            return Ok(Response::new(WorkerLifecycleResponse { acknowledged: false }));
        };

        let acknowledged = self.registry.cleanup_worker(worker.pod_name()).await.is_ok();
        Ok(Response::new(WorkerLifecycleResponse { acknowledged }))
    }

    async fn notify_ready(
        &self,
        request: Request<WorkerReadyRequest>,
    ) -> Result<Response<WorkerLifecycleResponse>, Status> {
        let req = request.into_inner();
        let acknowledged = self.registry.mark_ready(&req.guild_id).await;
        if !acknowledged {
            warn!("Readiness from untracked guild {}", req.guild_id);
        }
        Ok(Response::new(WorkerLifecycleResponse { acknowledged }))
    }
}
