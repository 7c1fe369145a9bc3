use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedRead {
    content: String,
    read_at: Instant,
}

/// Per-run read cache keyed by guarded path.
///
/// Entries expire after a fixed TTL and are dropped on any write to the same
/// path. Same-wave write/read races on one path are not serialized here: a
/// reader that looked up the entry before the writer invalidated it may see
/// the old content.
pub struct ReadCache {
    ttl: Duration,
    entries: Mutex<LruCache<PathBuf, CachedRead>>,
}

impl ReadCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, path: &Path) -> Option<String> {
        let mut entries = self.lock();
        let fresh = entries
            .get(path)
            .map(|entry| entry.read_at.elapsed() <= self.ttl)?;
        if fresh {
            entries.get(path).map(|entry| entry.content.clone())
        } else {
            entries.pop(path);
            None
        }
    }

    pub fn put(&self, path: PathBuf, content: String) {
        self.lock().put(
            path,
            CachedRead {
                content,
                read_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, path: &Path) {
        if self.lock().pop(path).is_some() {
            tracing::debug!("read cache invalidated: {}", path.display());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<PathBuf, CachedRead>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ReadCache::new(Duration::from_secs(30), 8);
        let path = PathBuf::from("/project/a.txt");
        cache.put(path.clone(), "alpha".into());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get(&path).as_deref(), Some("alpha"));

        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(cache.get(&path), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn write_invalidates_entry() {
        let cache = ReadCache::new(Duration::from_secs(30), 8);
        let path = PathBuf::from("/project/a.txt");
        cache.put(path.clone(), "alpha".into());
        cache.invalidate(&path);
        assert_eq!(cache.get(&path), None);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recent() {
        let cache = ReadCache::new(Duration::from_secs(30), 2);
        cache.put(PathBuf::from("/p/1"), "1".into());
        cache.put(PathBuf::from("/p/2"), "2".into());
        cache.put(PathBuf::from("/p/3"), "3".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(Path::new("/p/1")), None);
    }
}
