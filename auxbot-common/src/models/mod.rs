pub mod labels;
pub mod player;
pub mod queue;

pub use player::PlayerStatus;
pub use queue::QueueItem;
