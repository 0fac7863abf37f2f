use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const PRUNE_THRESHOLD: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Hit(V),
    /// A recent failure is remembered; callers should not retry yet.
    Failed,
    Miss,
}

#[derive(Debug)]
enum Slot<V> {
    Ready(V),
    Failed,
}

#[derive(Debug)]
struct Entry<V> {
    expires_at: Instant,
    slot: Slot<V>,
}

/// Time-bounded map shared between fetches. The lock is only taken for
/// lookups and inserts, never while a value is being computed.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, key: &K) -> Lookup<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => match &entry.slot {
                Slot::Ready(value) => Lookup::Hit(value.clone()),
                Slot::Failed => Lookup::Failed,
            },
            Some(_) => {
                entries.remove(key);
                Lookup::Miss
            }
            None => Lookup::Miss,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.store(key, Slot::Ready(value), self.ttl);
    }

    pub fn remember_failure(&self, key: K, ttl: Duration) {
        self.store(key, Slot::Failed, ttl);
    }

    /// Cached value, or run `factory` and cache its result. `Ok(None)` means a
    /// remembered failure short-circuited the call.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, factory: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        match self.lookup(&key) {
            Lookup::Hit(value) => return Ok(Some(value)),
            Lookup::Failed => return Ok(None),
            Lookup::Miss => {}
        }

        let value = factory().await?;
        self.insert(key, value.clone());
        Ok(Some(value))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn store(&self, key: K, slot: Slot<V>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            Entry {
                expires_at: now + ttl,
                slot,
            },
        );
        if entries.len() > PRUNE_THRESHOLD {
            entries.retain(|_, entry| entry.expires_at > now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_factory_runs_once_while_fresh() {
        let cache: TtlCache<i64, String> = TtlCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(7, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>("form".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value.as_deref(), Some("form"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: TtlCache<i64, u32> = TtlCache::new(Duration::from_secs(60));
        let failed = cache.get_or_try_insert_with(1, || async { Err::<u32, _>("boom") }).await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.lookup(&1), Lookup::Miss);
    }

    #[tokio::test]
    async fn test_remembered_failure_short_circuits() {
        let cache: TtlCache<(i64, i64), u32> = TtlCache::new(Duration::from_secs(60));
        cache.remember_failure((1, 2), Duration::from_secs(60));
        let result = cache
            .get_or_try_insert_with((1, 2), || async { Ok::<_, ()>(5) })
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache: TtlCache<i64, u32> = TtlCache::new(Duration::ZERO);
        cache.insert(1, 10);
        assert_eq!(cache.lookup(&1), Lookup::Miss);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_prunes_expired_entries_when_large() {
        let cache: TtlCache<usize, usize> = TtlCache::new(Duration::ZERO);
        for key in 0..=PRUNE_THRESHOLD {
            cache.insert(key, key);
        }
        assert!(cache.len() <= 1);
    }
}
