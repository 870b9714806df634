use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::types::ListItem;

/// Bounded cache of folder listings keyed by native media id.
///
/// Eviction is by insertion order: when full, the folder inserted first is
/// dropped. Re-inserting a cached folder replaces its children but keeps its
/// place in line. Lookups never touch the order.
///
/// Readers always receive their own copy of the children so that callers may
/// rewrite ids without corrupting the cache.
#[derive(Debug)]
pub struct FolderCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    order: VecDeque<String>,
    entries: HashMap<String, Vec<ListItem>>,
}

impl FolderCache {
    /// Create a cache holding at most `capacity` folders (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Copy of the cached children of `media_id`.
    pub fn get(&self, media_id: &str) -> Option<Vec<ListItem>> {
        self.inner.lock().entries.get(media_id).cloned()
    }

    /// Stores the children of `media_id`, returning the id of an evicted folder.
    pub fn insert(&self, media_id: impl Into<String>, items: Vec<ListItem>) -> Option<String> {
        let media_id = media_id.into();
        let mut inner = self.inner.lock();

        if inner.entries.insert(media_id.clone(), items).is_some() {
            return None;
        }

        inner.order.push_back(media_id);
        if inner.order.len() <= self.capacity {
            return None;
        }

        let evicted = inner.order.pop_front()?;
        inner.entries.remove(&evicted);
        Some(evicted)
    }

    /// Whether `media_id` is cached.
    pub fn contains(&self, media_id: &str) -> bool {
        self.inner.lock().entries.contains_key(media_id)
    }

    /// Cached folder ids, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().order.iter().cloned().collect()
    }

    /// Number of cached folders.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached folders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
