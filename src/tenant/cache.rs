use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Time source for expiry checks, injectable so tests can advance time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value cache with a fixed time-to-live per entry. Expired entries are
/// never returned and are dropped on the read that finds them.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it unless another writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if now < entry.expires_at {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.write().await.insert(key, Entry { value, expires_at });
    }

    pub async fn remove(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Remove every entry. Returns how many were held.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub(crate) struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<String, u32> = TtlCache::with_clock(Duration::from_secs(900), clock.clone());

        cache.insert("dev-trust".into(), 1).await;
        clock.advance(Duration::from_secs(899));
        assert_eq!(cache.get(&"dev-trust".to_string()).await, Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"dev-trust".to_string()).await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn reinsert_refreshes_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&'static str, u32> = TtlCache::with_clock(Duration::from_secs(10), clock.clone());

        cache.insert("a", 1).await;
        clock.advance(Duration::from_secs(8));
        cache.insert("a", 2).await;
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get(&"a").await, Some(2));
    }

    #[tokio::test]
    async fn clear_and_remove() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;

        assert!(cache.remove(&"a").await);
        assert!(!cache.remove(&"a").await);
        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.len().await, 0);
    }
}
