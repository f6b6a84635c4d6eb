//! Process-wide shutdown signal.
//!
//! Business logic never exits the process itself. It triggers this signal
//! with an exit code, and the binary's top-level loop waits on it and exits.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Option<i32>>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. The first code wins; later triggers are ignored.
    pub fn trigger(&self, exit_code: i32) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(exit_code);
                true
            } else {
                false
            }
        });
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        *self.tx.borrow()
    }

    /// Resolves with the exit code once shutdown has been requested.
    pub async fn wait(&self) -> i32 {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(code) = *rx.borrow_and_update() {
                return code;
            }
            // We hold the sender, so this only fails if it is dropped mid-wait.
            if rx.changed().await.is_err() {
                return 0;
            }
        }
    }
}
