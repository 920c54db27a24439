use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{Item, ItemId, PageResult, QueryKey};

struct CacheEntry {
    result: Arc<PageResult>,
    stored_at: Instant,
}

/// Most recent successful page per query key.
///
/// Entries are immutable: every write substitutes a whole `Arc<PageResult>`,
/// so a reader holding an earlier entry never observes a partial update.
/// Only a bounded number of keys is retained; the least recently written
/// key is dropped first.
pub struct ResultCache {
    entries: HashMap<QueryKey, CacheEntry>,
    order: VecDeque<QueryKey>,
    capacity: usize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn read(&self, key: &QueryKey) -> Option<Arc<PageResult>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry.result))
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Time since the entry for `key` was last written.
    pub fn age(&self, key: &QueryKey, now: Instant) -> Option<Duration> {
        self.entries
            .get(key)
            .map(|entry| now.saturating_duration_since(entry.stored_at))
    }

    /// Unconditional overwrite after a successful fetch.
    pub fn replace(&mut self, key: QueryKey, result: PageResult) -> Arc<PageResult> {
        let result = Arc::new(result);
        self.store(key, Arc::clone(&result));
        result
    }

    /// Swap in a new version of the single item `id` on the page cached under
    /// `key`.
    ///
    /// Returns `None` when the key is not cached (the patch has nothing to
    /// apply to). When `id` is not on the page the stored entry is returned
    /// as is.
    pub fn patch<F>(&mut self, key: &QueryKey, id: ItemId, mutator: F) -> Option<Arc<PageResult>>
    where
        F: FnOnce(&Item) -> Item,
    {
        let current = self.read(key)?;
        let patched = patch_page(&current, id, mutator);
        if !Arc::ptr_eq(&current, &patched) {
            self.store(key.clone(), Arc::clone(&patched));
        }
        Some(patched)
    }

    fn store(&mut self, key: QueryKey, result: Arc<PageResult>) {
        self.order.retain(|k| k != &key);
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Structural copy of `page` with the item `id` replaced by `mutator(item)`.
///
/// Untouched items keep their `Arc` identity. If `id` is absent the input
/// `Arc` itself is returned.
pub fn patch_page<F>(page: &Arc<PageResult>, id: ItemId, mutator: F) -> Arc<PageResult>
where
    F: FnOnce(&Item) -> Item,
{
    let Some(index) = page.items.iter().position(|item| item.id == id) else {
        return Arc::clone(page);
    };

    let mut items = page.items.clone();
    items[index] = Arc::new(mutator(&page.items[index]));
    Arc::new(PageResult {
        items,
        pagination: page.pagination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, SortMode, VoteDirection};
    use crate::testing::{item, page_of};

    fn hot(page: u32) -> QueryKey {
        QueryKey::new(SortMode::Hot, Period::Week, None, None, page)
    }

    #[test]
    fn test_read_missing_key() {
        let cache = ResultCache::new(4);
        assert!(cache.read(&hot(1)).is_none());
    }

    #[test]
    fn test_replace_then_read() {
        let mut cache = ResultCache::new(4);
        let stored = cache.replace(hot(1), page_of(vec![item(7, 10, 2)], 1));
        let read = cache.read(&hot(1)).unwrap();
        assert!(Arc::ptr_eq(&stored, &read));
        assert_eq!(read.items[0].upvotes, 10);
    }

    #[test]
    fn test_patch_replaces_only_target_item() {
        let mut cache = ResultCache::new(4);
        let before = cache.replace(hot(1), page_of(vec![item(7, 10, 2), item(8, 1, 1)], 2));

        let after = cache
            .patch(&hot(1), 7, |item| {
                item.with_tally(item.tally().apply(VoteDirection::Up))
            })
            .unwrap();

        assert_eq!(after.items[0].upvotes, 11);
        assert_eq!(after.items[0].downvotes, 2);
        assert!(Arc::ptr_eq(&before.items[1], &after.items[1]));
        // The earlier entry is untouched
        assert_eq!(before.items[0].upvotes, 10);
        assert!(Arc::ptr_eq(&cache.read(&hot(1)).unwrap(), &after));
    }

    #[test]
    fn test_patch_missing_item_is_noop() {
        let mut cache = ResultCache::new(4);
        let before = cache.replace(hot(1), page_of(vec![item(7, 10, 2)], 1));
        let snapshot = (*before).clone();

        let after = cache.patch(&hot(1), 99, |_| unreachable!()).unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(*after, snapshot);
    }

    #[test]
    fn test_patch_missing_key_is_noop() {
        let mut cache = ResultCache::new(4);
        assert!(cache.patch(&hot(3), 7, |item| item.clone()).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest_key() {
        let mut cache = ResultCache::new(2);
        cache.replace(hot(1), page_of(vec![item(1, 0, 0)], 1));
        cache.replace(hot(2), page_of(vec![item(2, 0, 0)], 1));
        cache.replace(hot(3), page_of(vec![item(3, 0, 0)], 1));

        assert!(!cache.contains(&hot(1)));
        assert!(cache.contains(&hot(2)));
        assert!(cache.contains(&hot(3)));
    }

    #[test]
    fn test_age() {
        let mut cache = ResultCache::new(2);
        cache.replace(hot(1), page_of(Vec::new(), 0));
        let later = Instant::now() + Duration::from_secs(5);
        assert!(cache.age(&hot(1), later).unwrap() >= Duration::from_secs(5));
        assert!(cache.age(&hot(2), later).is_none());
    }
}
