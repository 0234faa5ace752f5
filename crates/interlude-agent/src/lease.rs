//! Per-thread run leases
//!
//! At most one run per thread. A lease is taken before the thread's state is
//! loaded and released when the guard drops, so a second submit or resume on
//! a busy thread fails fast with `ThreadBusy`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use interlude_core::{Error, Result, ThreadId};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct ThreadLeases {
    held: Arc<DashMap<ThreadId, ()>>,
}

impl ThreadLeases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, thread_id: &ThreadId) -> Result<ThreadLease> {
        match self.held.entry(thread_id.clone()) {
            Entry::Occupied(_) => Err(Error::ThreadBusy(thread_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                debug!(thread = %thread_id, "lease acquired");
                Ok(ThreadLease {
                    thread_id: thread_id.clone(),
                    held: self.held.clone(),
                })
            }
        }
    }

    pub fn is_held(&self, thread_id: &ThreadId) -> bool {
        self.held.contains_key(thread_id)
    }

    pub fn count(&self) -> usize {
        self.held.len()
    }
}

/// Exclusive right to run a thread. Dropping it frees the thread.
pub struct ThreadLease {
    thread_id: ThreadId,
    held: Arc<DashMap<ThreadId, ()>>,
}

impl ThreadLease {
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        self.held.remove(&self.thread_id);
        debug!(thread = %self.thread_id, "lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let leases = ThreadLeases::new();
        let id = ThreadId::new("t");
        let lease = leases.acquire(&id).unwrap();
        assert!(matches!(leases.acquire(&id), Err(Error::ThreadBusy(_))));
        assert!(leases.acquire(&ThreadId::new("other")).is_ok());
        drop(lease);
        assert!(!leases.is_held(&id));
        assert!(leases.acquire(&id).is_ok());
    }
}
