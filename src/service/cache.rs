//! In-memory cache with TTL expiration
//!
//! Holds converted images so repeated requests for the same picture and
//! settings (a user re-running a command on their avatar) skip the work.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use blurplefier::ConvertedImage;

/// A cached entry with expiration time
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache key for one conversion request
///
/// Two SipHash digests under independent random keys plus the input length.
/// The keys are drawn per cache, so colliding requests cannot be built
/// offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionKey {
    digest: [u64; 2],
    len: usize,
}

/// Converted images keyed by request
pub struct ConversionCache {
    ttl: Duration,
    capacity: usize,
    hashers: [RandomState; 2],
    entries: RwLock<HashMap<ConversionKey, CacheEntry<Arc<ConvertedImage>>>>,
}

impl ConversionCache {
    /// A capacity of 0 disables caching
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            hashers: [RandomState::new(), RandomState::new()],
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Key for a request
    ///
    /// Flags are sorted and de-duplicated first, matching how the resolver
    /// applies them.
    pub fn key<S: AsRef<str>>(
        &self,
        image_data: &[u8],
        modifier: &str,
        method: &str,
        flags: &[S],
        replace_background: bool,
    ) -> ConversionKey {
        let mut sorted: Vec<&str> = flags.iter().map(|f| f.as_ref()).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let digest = self.hashers.each_ref().map(|state| {
            let mut hasher = state.build_hasher();
            image_data.hash(&mut hasher);
            modifier.hash(&mut hasher);
            method.hash(&mut hasher);
            sorted.hash(&mut hasher);
            replace_background.hash(&mut hasher);
            hasher.finish()
        });

        ConversionKey {
            digest,
            len: image_data.len(),
        }
    }

    /// Get a cached conversion if not expired
    pub async fn get(&self, key: &ConversionKey) -> Option<Arc<ConvertedImage>> {
        let cache = self.entries.read().await;
        cache.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Store a conversion
    ///
    /// Expired entries are dropped first; when the cache is still full the
    /// new entry is not stored.
    pub async fn insert(&self, key: ConversionKey, image: Arc<ConvertedImage>) {
        if self.capacity == 0 {
            return;
        }

        let mut cache = self.entries.write().await;
        cache.retain(|_, entry| !entry.is_expired());

        if cache.len() >= self.capacity && !cache.contains_key(&key) {
            tracing::debug!("Conversion cache full ({} entries), not caching", cache.len());
            return;
        }

        cache.insert(key, CacheEntry::new(image, self.ttl));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blurplefier::OutputFormat;

    const NO_FLAGS: &[&str] = &[];

    fn converted(byte: u8) -> Arc<ConvertedImage> {
        Arc::new(ConvertedImage {
            bytes: vec![byte],
            format: OutputFormat::Png,
            file_name: "light.png".into(),
        })
    }

    #[test]
    fn test_key_ignores_flag_order() {
        let cache = ConversionCache::new(Duration::from_secs(60), 4);
        let a = cache.key(b"img", "light", "--remap", &["++b", "++a"], false);
        let b = cache.key(b"img", "light", "--remap", &["++a", "++b", "++a"], false);
        let c = cache.key(b"img", "light", "--remap", &["++a", "++b"], true);
        let d = cache.key(b"img2", "light", "--remap", &["++a", "++b"], false);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_key_separates_parameters() {
        let cache = ConversionCache::new(Duration::from_secs(60), 4);
        let base = cache.key(b"img", "light", "--remap", NO_FLAGS, false);
        assert_ne!(base, cache.key(b"img", "dark", "--remap", NO_FLAGS, false));
        assert_ne!(base, cache.key(b"img", "light", "--filter", NO_FLAGS, false));
        assert_ne!(base, cache.key(b"im", "light", "--remap", NO_FLAGS, false));
        assert_ne!(base.digest[0], base.digest[1]);
    }

    #[tokio::test]
    async fn test_get_and_insert() {
        let cache = ConversionCache::new(Duration::from_secs(60), 4);
        let key = cache.key(b"img", "light", "--remap", NO_FLAGS, false);
        assert!(cache.get(&key).await.is_none());

        cache.insert(key, converted(1)).await;
        assert_eq!(cache.get(&key).await.unwrap().bytes, vec![1]);
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = ConversionCache::new(Duration::ZERO, 4);
        let key = cache.key(b"img", "light", "--remap", NO_FLAGS, false);
        cache.insert(key, converted(1)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = ConversionCache::new(Duration::from_secs(60), 2);
        for i in 0..3u8 {
            let key = cache.key(&[i], "light", "--remap", NO_FLAGS, false);
            cache.insert(key, converted(i)).await;
        }
        assert_eq!(cache.len().await, 2);

        let disabled = ConversionCache::new(Duration::from_secs(60), 0);
        let key = disabled.key(b"img", "light", "--remap", NO_FLAGS, false);
        disabled.insert(key, converted(1)).await;
        assert_eq!(disabled.len().await, 0);
    }
}
