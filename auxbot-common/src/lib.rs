// auxbot-common/src/lib.rs

pub mod error;
pub mod models;
pub mod shutdown;
pub mod traits;

pub use error::Error;
pub use shutdown::ShutdownSignal;
