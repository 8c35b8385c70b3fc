use lru::LruCache;
use std::{
    hash::Hash,
    num::NonZeroUsize,
    time::{Duration, Instant},
};

struct Entry<V> {
    value: V,
    last_access: Instant,
}

/// A capacity-bounded cache with idle expiry.
///
/// On insertion beyond capacity the least-recently-used entry is handed back
/// to the caller for resource release. Accessing an entry updates its
/// recency; expired entries are dropped lazily on access and collected by
/// [`LruTtlCache::take_expired`] from the periodic sweep.
pub(crate) struct LruTtlCache<K: Hash + Eq, V> {
    inner: LruCache<K, Entry<V>>,
    idle_ttl: Duration,
}

impl<K: Hash + Eq + Clone, V> LruTtlCache<K, V> {
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        Self {
            inner: LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(/* >= 1 */),
            ),
            idle_ttl,
        }
    }

    /// Inserts `value`, returning the evicted least-recently-used entry if
    /// the capacity bound was exceeded.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.inner
            .push(
                key,
                Entry {
                    value,
                    last_access: Instant::now(),
                },
            )
            .map(|(k, entry)| (k, entry.value))
    }

    /// Looks up `key`, refreshing its recency; an idle-expired entry is
    /// removed and handed back instead.
    pub fn get(&mut self, key: &K) -> Result<Option<&V>, V> {
        let expired = match self.inner.peek(key) {
            None => return Ok(None),
            Some(entry) => entry.last_access.elapsed() > self.idle_ttl,
        };
        if expired {
            let entry = self.inner.pop(key).unwrap(/* peeked above */);
            return Err(entry.value);
        }
        let entry = self.inner.get_mut(key).unwrap(/* peeked above */);
        entry.last_access = Instant::now();
        Ok(Some(&entry.value))
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.pop(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    /// Removes and returns all idle-expired entries.
    pub fn take_expired(&mut self) -> Vec<(K, V)> {
        let expired_keys: Vec<K> = self
            .inner
            .iter()
            .filter(|(_, entry)| entry.last_access.elapsed() > self.idle_ttl)
            .map(|(key, _)| key.clone())
            .collect();
        expired_keys
            .into_iter()
            .filter_map(|key| self.inner.pop(&key).map(|entry| (key, entry.value)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.iter().map(|(_, entry)| &entry.value)
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for LruTtlCache<K, V> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("LruTtlCache")
            .field("len", &self.inner.len())
            .field("cap", &self.inner.cap())
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::LruTtlCache;
    use std::time::Duration;

    #[test]
    fn capacity_bound_evicts_least_recently_used() {
        let mut cache = LruTtlCache::new(2, Duration::from_secs(600));
        assert!(cache.insert("a", 1).is_none());
        assert!(cache.insert("b", 2).is_none());
        // touch "a" so that "b" becomes the victim
        assert_eq!(cache.get(&"a").unwrap(), Some(&1));
        let evicted = cache.insert("c", 3).unwrap();
        assert_eq!(evicted, ("b", 2));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn idle_entries_expire_on_access_and_on_sweep() {
        let mut cache = LruTtlCache::new(8, Duration::from_millis(20));
        cache.insert("a", 1);
        cache.insert("b", 2);
        std::thread::sleep(Duration::from_millis(40));
        // lazy path: access hands the expired value back
        assert_eq!(cache.get(&"a").unwrap_err(), 1);
        // sweep path: the remaining entry is collected
        let expired = cache.take_expired();
        assert_eq!(expired, vec![("b", 2)]);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn access_refreshes_idle_deadline() {
        let mut cache = LruTtlCache::new(8, Duration::from_millis(50));
        cache.insert("a", 1);
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(20));
            assert_eq!(cache.get(&"a").unwrap(), Some(&1));
        }
    }
}
