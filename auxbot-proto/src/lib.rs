pub mod auxbot {
    pub mod player {
        tonic::include_proto!("auxbot.player");
    }

    pub mod search {
        tonic::include_proto!("auxbot.search");
    }

    pub mod health {
        tonic::include_proto!("auxbot.health");
    }

    pub mod lifecycle {
        tonic::include_proto!("auxbot.lifecycle");
    }
}

// Re-export prost_types for convenience
pub use prost_types;
