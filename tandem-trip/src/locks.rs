use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-trip async locks: at most one mutation in flight per trip id, while
/// mutations on different trips proceed fully in parallel.
#[derive(Default)]
pub struct TripLocks {
    inner: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl TripLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, trip_id: Uuid) -> OwnedMutexGuard<()> {
        let handle = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                map.entry(trip_id)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        handle.lock_owned().await
    }
}
