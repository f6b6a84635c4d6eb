//! auxbot-worker/src/server.rs
//!
//! Serves the Player, Search and HealthCheck services until shutdown.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tracing::{error, info};

use auxbot_common::{Error, ShutdownSignal};
use auxbot_proto::auxbot::health::health_check_server::HealthCheckServer;
use auxbot_proto::auxbot::player::player_server::PlayerServer;
use auxbot_proto::auxbot::search::search_server::SearchServer;

use crate::grpc_services::{HealthServiceImpl, PlayerServiceImpl, SearchServiceImpl};

pub struct WorkerServices {
    pub player: PlayerServiceImpl,
    pub search: SearchServiceImpl,
    pub health: HealthServiceImpl,
}

/// Binds `addr` and spawns the gRPC server. Returns once the port is bound,
/// so callers can report readiness straight after.
pub async fn spawn_grpc_server(
    addr: SocketAddr,
    services: WorkerServices,
    shutdown: ShutdownSignal,
) -> Result<(SocketAddr, JoinHandle<()>), Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("gRPC server listening on {}", local_addr);

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        let result = Server::builder()
            .add_service(PlayerServer::new(services.player))
            .add_service(SearchServer::new(services.search))
            .add_service(HealthCheckServer::new(services.health))
            .serve_with_incoming_shutdown(incoming, async move {
                shutdown.wait().await;
            })
            .await;
        if let Err(e) = result {
            error!("gRPC server error: {:?}", e);
        }
        info!("gRPC server stopped");
    });

    Ok((local_addr, handle))
}
