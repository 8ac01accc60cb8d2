//! Per-key debouncing of delayed async actions

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Table {
    pending: HashMap<String, Pending>,
    next_generation: u64,
}

/// Coalesces bursts of same-key triggers into one delayed action.
///
/// At most one action is pending per key. Replacing or cancelling a pending
/// action is synchronous: once `schedule` or `cancel` returns, the displaced
/// action will never start. A firing task claims its own table entry under
/// the lock before running, and gives up if the entry is gone or belongs to a
/// newer generation.
#[derive(Clone, Default)]
pub struct Debouncer {
    table: Arc<Mutex<Table>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` after `delay`, replacing any pending action for `key`
    pub fn schedule<F>(&self, key: &str, action: F, delay: Duration)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = table.pending.remove(key) {
            trace!(key, "Replacing pending debounced action");
            previous.handle.abort();
        }

        table.next_generation += 1;
        let generation = table.next_generation;

        let shared = Arc::clone(&self.table);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut table = shared.lock().unwrap_or_else(|e| e.into_inner());
                match table.pending.get(&owned_key) {
                    Some(pending) if pending.generation == generation => {
                        table.pending.remove(&owned_key);
                    }
                    _ => return,
                }
            }

            trace!(key = %owned_key, "Debounced action fired");
            action.await;
        });

        table
            .pending
            .insert(key.to_string(), Pending { generation, handle });
    }

    /// Aborts the pending action for `key` without running it
    pub fn cancel(&self, key: &str) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = table.pending.remove(key) {
            pending.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.pending.contains_key(key)
    }
}
