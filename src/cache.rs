//! Bounded LRU of decoded segment buffers (C8).
//!
//! Built on the `lru` crate's `LruCache` rather than a hand-rolled ring
//! buffer or map-plus-queue (see DESIGN.md for why this dependency was
//! pulled in). Concurrent misses for the same index are coalesced through
//! a `Mutex`+`Condvar` pending-placeholder rather than a channel or an
//! async notify.

use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex};

use log::trace;
use lru::LruCache;

use crate::error::Result;

enum Slot {
    /// Another caller is already decoding this segment.
    Pending,
    Ready(Arc<Vec<u8>>),
}

pub struct SegmentCache {
    state: Mutex<LruCache<usize, Slot>>,
    condvar: Condvar,
}

impl SegmentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        SegmentCache {
            state: Mutex::new(LruCache::new(capacity)),
            condvar: Condvar::new(),
        }
    }

    /// Returns the decoded bytes for `index`, running `load` on a cache
    /// miss. If another call is already loading the same `index`, this
    /// call blocks until that load publishes a result (or fails) instead
    /// of decoding the segment twice.
    pub fn get_or_load(
        &self,
        index: usize,
        load: impl FnOnce() -> Result<Vec<u8>>,
    ) -> Result<Arc<Vec<u8>>> {
        let mut guard = self.state.lock().unwrap();
        loop {
            match guard.get(&index) {
                Some(Slot::Ready(buf)) => {
                    trace!("segment {index}: cache hit");
                    return Ok(Arc::clone(buf));
                }
                Some(Slot::Pending) => guard = self.condvar.wait(guard).unwrap(),
                None => break,
            }
        }
        guard.put(index, Slot::Pending);
        drop(guard);

        trace!("segment {index}: cache miss, loading");
        let loaded = load();

        let mut guard = self.state.lock().unwrap();
        let result = match loaded {
            Ok(bytes) => {
                let bytes = Arc::new(bytes);
                guard.put(index, Slot::Ready(Arc::clone(&bytes)));
                Ok(bytes)
            }
            Err(err) => {
                guard.pop(&index);
                Err(err)
            }
        };
        drop(guard);
        self.condvar.notify_all();
        result
    }

    /// Drops every cached buffer. Called from `File::close`.
    pub fn clear(&self) {
        self.state.lock().unwrap().clear();
    }
}
