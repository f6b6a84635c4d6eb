// File: auxbot-common/src/models/player.rs

use serde::{Deserialize, Serialize};
use std::fmt;

use auxbot_proto::auxbot::player::PlayerStatus as ProtoPlayerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Playing,
    Paused,
    Buffering,
    Error,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Buffering => "buffering",
            PlayerStatus::Error => "error",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PlayerStatus> for ProtoPlayerStatus {
    fn from(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Idle => ProtoPlayerStatus::Idle,
            PlayerStatus::Playing => ProtoPlayerStatus::Playing,
            PlayerStatus::Paused => ProtoPlayerStatus::Paused,
            PlayerStatus::Buffering => ProtoPlayerStatus::Buffering,
            PlayerStatus::Error => ProtoPlayerStatus::Error,
        }
    }
}

impl From<ProtoPlayerStatus> for PlayerStatus {
    fn from(status: ProtoPlayerStatus) -> Self {
        match status {
            ProtoPlayerStatus::Idle => PlayerStatus::Idle,
            ProtoPlayerStatus::Playing => PlayerStatus::Playing,
            ProtoPlayerStatus::Paused => PlayerStatus::Paused,
            ProtoPlayerStatus::Buffering => PlayerStatus::Buffering,
            ProtoPlayerStatus::Error => PlayerStatus::Error,
        }
    }
}
