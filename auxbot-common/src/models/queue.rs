// File: auxbot-common/src/models/queue.rs

use serde::{Deserialize, Serialize};

/// One pending track request. Duplicate `media_ref`s are legal and independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub media_ref: String,
    pub requester_id: String,
}

impl QueueItem {
    pub fn new(media_ref: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            media_ref: media_ref.into(),
            requester_id: requester_id.into(),
        }
    }
}

impl From<QueueItem> for auxbot_proto::auxbot::player::QueueItem {
    fn from(item: QueueItem) -> Self {
        Self {
            url: item.media_ref,
            requester_id: item.requester_id,
        }
    }
}

impl From<auxbot_proto::auxbot::player::QueueItem> for QueueItem {
    fn from(item: auxbot_proto::auxbot::player::QueueItem) -> Self {
        Self {
            media_ref: item.url,
            requester_id: item.requester_id,
        }
    }
}
