// gRPC service implementations served by the worker

pub mod health_service;
pub mod player_service;
pub mod search_service;

pub use health_service::HealthServiceImpl;
pub use player_service::PlayerServiceImpl;
pub use search_service::SearchServiceImpl;
