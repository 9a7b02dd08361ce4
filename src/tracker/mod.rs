//! Completion tracking for resume logic.
//!
//! An item is marked finished as soon as its transfer succeeds and its file is
//! closed, before finalization runs. A later finalization failure therefore
//! does not hide the fact that the bytes are on disk.
//!
//! ## Implementations
//!
//! - [`MemoryTracker`] - process-local set of finished ids
//! - [`SqliteTracker`] - persists finished ids across runs

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::ItemId;

mod sqlite;

pub use sqlite::SqliteTracker;

/// Records items whose transfer fully succeeded
#[async_trait]
pub trait CompletionTracker: Send + Sync {
    /// Mark `id` as finished; calling it twice for one id is harmless
    ///
    /// Storage failures are logged by the implementation, never returned.
    async fn finish(&self, id: ItemId);
}

/// In-memory completion set
#[derive(Debug, Default)]
pub struct MemoryTracker {
    finished: Mutex<HashSet<ItemId>>,
}

impl MemoryTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was marked finished
    pub fn is_finished(&self, id: ItemId) -> bool {
        self.lock().contains(&id)
    }

    /// All finished ids, ascending
    pub fn finished_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<ItemId>> {
        self.finished
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CompletionTracker for MemoryTracker {
    async fn finish(&self, id: ItemId) {
        self.lock().insert(id);
    }
}
