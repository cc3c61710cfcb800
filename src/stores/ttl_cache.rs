use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            ttl,
            expires_at: now + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory key/value cache with sliding per-entry expiration.
///
/// Every read or write of a live entry pushes its expiry out by its TTL.
/// Single-key operations are atomic with respect to each other.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let value = match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = now + entry.ttl;
                Some(entry.value.clone())
            }
            _ => None,
        };

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        value
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub fn set_at(&self, key: K, value: V, ttl: Duration, now: Instant) {
        self.entries.insert(key, Entry::new(value, ttl, now));
    }

    /// Atomically replace the value for `key` with `f(current)`, where
    /// `current` is `None` when the key is absent or expired.
    /// Returns the stored value.
    pub fn update<F>(&self, key: K, ttl: Duration, f: F) -> V
    where
        F: FnOnce(Option<&V>) -> V,
    {
        self.update_at(key, ttl, Instant::now(), f)
    }

    pub fn update_at<F>(&self, key: K, ttl: Duration, now: Instant, f: F) -> V
    where
        F: FnOnce(Option<&V>) -> V,
    {
        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let current = if occupied.get().is_expired(now) {
                    None
                } else {
                    Some(&occupied.get().value)
                };
                let new_value = f(current);
                occupied.insert(Entry::new(new_value.clone(), ttl, now));
                new_value
            }
            MapEntry::Vacant(vacant) => {
                let new_value = f(None);
                vacant.insert(Entry::new(new_value.clone(), ttl, now));
                new_value
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_set_and_get() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.set("a".to_string(), 1, TTL);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        let start = Instant::now();
        cache.set_at("a", 1, TTL, start);

        assert_eq!(cache.get_at(&"a", start + Duration::from_secs(59)), Some(1));
        // The read above slid the expiry forward
        assert_eq!(cache.get_at(&"a", start + Duration::from_secs(118)), Some(1));
        assert_eq!(cache.get_at(&"a", start + Duration::from_secs(300)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_seeds_and_increments() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        let start = Instant::now();

        let first = cache.update_at("a", TTL, start, |v| v.map_or(1, |c| c + 1));
        let second = cache.update_at("a", TTL, start, |v| v.map_or(1, |c| c + 1));
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        // Expired values are treated as absent
        let third = cache.update_at("a", TTL, start + Duration::from_secs(120), |v| {
            v.map_or(1, |c| c + 1)
        });
        assert_eq!(third, 1);
    }

    #[test]
    fn test_remove() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.set("a", 5, TTL);
        assert_eq!(cache.remove(&"a"), Some(5));
        assert_eq!(cache.remove(&"a"), None);
        assert!(!cache.contains(&"a"));
    }

    #[test]
    fn test_purge_expired() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        let start = Instant::now();
        cache.set_at("old", 1, Duration::from_secs(10), start);
        cache.set_at("new", 2, Duration::from_secs(100), start);

        let removed = cache.purge_expired_at(start + Duration::from_secs(50));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&"new", start + Duration::from_secs(50)), Some(2));
    }

    #[test]
    fn test_concurrent_updates_are_atomic() {
        use std::sync::Arc;
        use std::thread;

        let cache: Arc<TtlCache<&'static str, u32>> = Arc::new(TtlCache::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    cache.update("hash", TTL, |v| v.map_or(1, |c| c + 1));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.get(&"hash"), Some(800));
    }
}
