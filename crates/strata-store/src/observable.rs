//! Observable state cell
//!
//! Holds the live state tree and delivers change notifications to deep
//! watchers. This is the boundary with the reactive observation layer:
//! - replacement of the whole tree is atomic
//! - every write batch bumps a version and notifies watchers synchronously
//! - readers take cheap snapshots (`Arc<Value>`); a writer only clones the
//!   tree when a snapshot is still held elsewhere

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use strata_core::StoreResult;

/// Deep watcher: called once per write batch with the new tree
pub type DeepWatcher = Arc<dyn Fn(&Value) -> StoreResult<()> + Send + Sync>;

/// Handle identifying a registered watcher
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

/// Live state tree with synchronous deep watchers
pub struct Observable {
    current: RwLock<Arc<Value>>,
    version: AtomicU64,
    watchers: Mutex<Vec<(WatcherId, DeepWatcher)>>,
    next_id: AtomicU64,
}

impl Observable {
    pub fn new(initial: Value) -> Self {
        Observable {
            current: RwLock::new(Arc::new(initial)),
            version: AtomicU64::new(0),
            watchers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current tree
    pub fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.current.read())
    }

    /// Incremented on every write batch
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Apply a write batch, then notify watchers.
    ///
    /// The first watcher error is returned; the write itself is not undone.
    pub fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> StoreResult<R> {
        let result = {
            let mut current = self.current.write();
            f(Arc::make_mut(&mut current))
        };
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify()?;
        Ok(result)
    }

    /// Swap in a whole new tree; returns the previous one
    pub fn replace(&self, next: Value) -> StoreResult<Arc<Value>> {
        let previous = std::mem::replace(&mut *self.current.write(), Arc::new(next));
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify()?;
        Ok(previous)
    }

    /// Force every watcher to re-evaluate without changing the tree
    pub fn touch(&self) -> StoreResult<()> {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify()
    }

    pub fn watch_deep(&self, watcher: DeepWatcher) -> WatcherId {
        let id = WatcherId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.watchers.lock().push((id, watcher));
        id
    }

    pub fn unwatch(&self, id: WatcherId) -> bool {
        let mut watchers = self.watchers.lock();
        let before = watchers.len();
        watchers.retain(|(existing, _)| *existing != id);
        watchers.len() != before
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    fn notify(&self) -> StoreResult<()> {
        let watchers: Vec<DeepWatcher> = self
            .watchers
            .lock()
            .iter()
            .map(|(_, watcher)| Arc::clone(watcher))
            .collect();
        if watchers.is_empty() {
            return Ok(());
        }

        let state = self.snapshot();
        let mut first_error = None;
        for watcher in watchers {
            if let Err(err) = watcher(&state) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
