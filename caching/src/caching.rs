// caching/src/caching.rs
use std::time::Duration;
use moka::future::Cache as MokaCache;

/// String-keyed async cache with an optional time-to-live.
#[derive(Clone)]
pub struct Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: MokaCache<String, V>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        Cache {
            inner: MokaCache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: V) {
        self.inner.insert(key, value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::Cache;
    use std::time::Duration;

    #[tokio::test]
    async fn stores_entries_by_key() {
        let cache: Cache<Vec<f64>> = Cache::with_ttl(16, Duration::from_secs(60));
        cache.insert("18.5,73.8".to_string(), vec![1.5, 2.5]).await;
        assert_eq!(cache.get("18.5,73.8").await, Some(vec![1.5, 2.5]));
        assert_eq!(cache.get("18.6,73.8").await, None);
    }

    #[tokio::test]
    async fn expires_entries_after_ttl() {
        let cache: Cache<u32> = Cache::with_ttl(16, Duration::from_millis(50));
        cache.insert("k".to_string(), 7).await;
        assert_eq!(cache.get("k").await, Some(7));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get("k").await, None);
    }
}
