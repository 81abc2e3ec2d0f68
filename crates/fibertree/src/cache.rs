use crate::{FibertreeError, FibertreeResult};
use core::cell::RefCell;
use core::num::NonZeroUsize;
use hashbrown::HashMap;
use lru::LruCache;
use std::rc::Rc;

/// Kind of lookup a cache entry memoizes.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheOp {
    /// Coordinate stored at a handle.
    HandleToCoord,
    /// Handle found for a coordinate, valid for one structural version of the fiber.
    CoordToHandle {
        /// Structural mutation count of the fiber when the entry was written.
        version: u64,
    },
}

/// Key of the access cache: fiber name, lookup kind and position.
#[derive(new, Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    fiber: String,
    op: CacheOp,
    position: usize,
}

/// Bounded LRU store modelling an on-chip buffer in front of backing memory.
///
/// Every lookup counts as a hit or a miss.
#[derive(Debug)]
pub struct AccessCache {
    entries: LruCache<CacheKey, usize>,
    hits: usize,
    misses: usize,
}

/// Cache shared by every format fiber of one encoded tensor.
pub type SharedCache = Rc<RefCell<AccessCache>>;

impl AccessCache {
    /// Creates a cache holding up to `capacity` entries.
    pub fn new(capacity: usize) -> FibertreeResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or(FibertreeError::ZeroCacheCapacity)?;

        Ok(Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        })
    }

    /// Creates a cache ready to be injected into fibers.
    pub fn shared(capacity: usize) -> FibertreeResult<SharedCache> {
        Ok(Rc::new(RefCell::new(Self::new(capacity)?)))
    }

    /// Looks up a key, counting a hit or a miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<usize> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(*value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a value, evicting the least recently used entry when full.
    pub fn put(&mut self, key: CacheKey, value: usize) {
        if let Some((evicted, _)) = self.entries.push(key.clone(), value) {
            if evicted != key {
                log::trace!("Evicted {evicted:?} from the access cache");
            }
        }
    }

    /// Reads a key then refreshes it with `value`, the way a buffer fill works.
    pub fn access(&mut self, key: CacheKey, value: usize) -> Option<usize> {
        let previous = self.get(&key);
        self.put(key, value);
        previous
    }

    /// Number of lookups that found their key.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that did not.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Writes hit and miss counts as buffer and backing memory accesses.
    pub fn dump(&self, name: &str, output: &mut HashMap<String, usize>) {
        output.insert(format!("{name}_buffer_access"), self.hits);
        output.insert(format!("{name}_DRAM_access"), self.misses);
    }
}
