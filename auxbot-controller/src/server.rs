//! auxbot-controller/src/server.rs
//!
//! Serves the WorkerLifecycle service until shutdown.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tracing::{error, info};

use auxbot_common::{Error, ShutdownSignal};
use auxbot_proto::auxbot::lifecycle::worker_lifecycle_server::WorkerLifecycleServer;

use crate::grpc_services::WorkerLifecycleServiceImpl;

pub async fn spawn_grpc_server(
    addr: SocketAddr,
    lifecycle: WorkerLifecycleServiceImpl,
    shutdown: ShutdownSignal,
) -> Result<(SocketAddr, JoinHandle<()>), Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Lifecycle gRPC server listening on {}", local_addr);

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        let result = Server::builder()
            .add_service(WorkerLifecycleServer::new(lifecycle))
            .serve_with_incoming_shutdown(incoming, async move {
                shutdown.wait().await;
            })
            .await;
        if let Err(e) = result {
            error!("gRPC server error: {:?}", e);
        }
        info!("Lifecycle gRPC server stopped");
    });

    Ok((local_addr, handle))
}
