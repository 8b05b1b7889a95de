use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Registry = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

/// Serializes grocery regeneration per plan.
#[derive(Clone, Default)]
pub struct RegenerationGuard {
    locks: Registry,
}

/// Held for the duration of one regeneration.
pub struct PlanLock {
    plan_id: Uuid,
    locks: Registry,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RegenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, plan_id: Uuid) -> PlanLock {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(plan_id).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        PlanLock {
            plan_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl Drop for PlanLock {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // only the registry still references the mutex: nobody is waiting
        if locks
            .get(&self.plan_id)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            locks.remove(&self.plan_id);
        }
    }
}
