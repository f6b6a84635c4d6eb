// auxbot-worker/src/queue.rs

use std::collections::VecDeque;

use auxbot_common::models::QueueItem;

/// In-memory FIFO of pending track requests. No capacity bound, no dedup,
/// no validation of the media ref; that is the caller's job.
#[derive(Debug, Default, Clone)]
pub struct Queue {
    items: VecDeque<QueueItem>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends and returns the zero-based insertion index. The index is
    /// informational only and goes stale as soon as the queue moves.
    pub fn add(&mut self, media_ref: impl Into<String>, requester_id: impl Into<String>) -> usize {
        self.items.push_back(QueueItem::new(media_ref, requester_id));
        self.items.len() - 1
    }

    /// Removes and returns the head. `None` means empty, never an error.
    pub fn pop(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy of the pending items in play order.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.iter().cloned().collect()
    }
}
