use dashmap::DashSet;

/// Hashes that kept collecting strikes after they should already have been removed.
///
/// Lives for the whole process; owners decide when to clear it.
#[derive(Debug, Default)]
pub struct RecurringOffenders {
    hashes: DashSet<String>,
}

impl RecurringOffenders {
    pub fn new() -> Self {
        Self {
            hashes: DashSet::new(),
        }
    }

    /// Mark a hash; returns true when it was not marked before
    pub fn mark(&self, hash: &str) -> bool {
        self.hashes.insert(hash.to_ascii_lowercase())
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(&hash.to_ascii_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        self.hashes.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn clear(&self) {
        self.hashes.clear();
    }
}
