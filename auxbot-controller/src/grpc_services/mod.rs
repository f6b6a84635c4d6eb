// gRPC services served by the controller

pub mod lifecycle_service;

pub use lifecycle_service::WorkerLifecycleServiceImpl;
