//! Checkpoint store - one durable `ThreadState` per thread

use dashmap::DashMap;
use interlude_core::{Error, Result, ThreadId, ThreadState};

/// Persistence seam for thread state. A thread that was never saved loads
/// as a fresh, idle state with an empty ledger.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &ThreadId) -> Result<ThreadState>;

    /// Replace the stored state wholesale.
    async fn save(&self, thread_id: &ThreadId, state: ThreadState) -> Result<()>;

    /// Forget a thread. Returns whether anything was stored.
    async fn clear(&self, thread_id: &ThreadId) -> Result<bool>;

    async fn list(&self) -> Result<Vec<ThreadId>>;
}

/// Process-local store. State lives as long as the process does.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: DashMap<ThreadId, ThreadState>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<ThreadState> {
        Ok(self
            .threads
            .get(thread_id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| ThreadState::new(thread_id.clone())))
    }

    async fn save(&self, thread_id: &ThreadId, state: ThreadState) -> Result<()> {
        if &state.thread_id != thread_id {
            return Err(Error::Store(format!(
                "state for {} saved under {}",
                state.thread_id, thread_id
            )));
        }
        state.ledger.validate()?;
        self.threads.insert(thread_id.clone(), state);
        Ok(())
    }

    async fn clear(&self, thread_id: &ThreadId) -> Result<bool> {
        Ok(self.threads.remove(thread_id).is_some())
    }

    async fn list(&self) -> Result<Vec<ThreadId>> {
        let mut ids: Vec<ThreadId> = self.threads.iter().map(|e| e.key().clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}
