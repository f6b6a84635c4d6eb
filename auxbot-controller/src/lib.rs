//! auxbot-controller: provisions one worker per guild on Kubernetes, keeps
//! track of them and reclaims them when they exit or stop answering.

pub mod cluster;
pub mod config;
pub mod grpc_services;
pub mod health;
pub mod http_api;
pub mod provisioner;
pub mod registry;
pub mod server;
pub mod worker_client;

pub use config::ControllerConfig;
pub use registry::WorkerRegistry;
