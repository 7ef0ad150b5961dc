use std::collections::HashSet;

use parking_lot::Mutex;

/// Tracks sends the caller still considers in flight, keyed by temp guid.
/// The registry removes an entry once its promise settles.
pub trait SendCache: Send + Sync {
    fn remove(&self, temp_guid: &str);
}

/// In-memory [`SendCache`].
#[derive(Debug, Default)]
pub struct PendingSends {
    guids: Mutex<HashSet<String>>,
}

impl PendingSends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, temp_guid: impl Into<String>) {
        self.guids.lock().insert(temp_guid.into());
    }

    pub fn contains(&self, temp_guid: &str) -> bool {
        self.guids.lock().contains(temp_guid)
    }

    pub fn len(&self) -> usize {
        self.guids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.lock().is_empty()
    }
}

impl SendCache for PendingSends {
    fn remove(&self, temp_guid: &str) {
        self.guids.lock().remove(temp_guid);
    }
}
