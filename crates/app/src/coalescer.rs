//! Indicator coalescing.
//!
//! Many devices can sit on the same panel; a scene that switches six lamps
//! should still produce one backlight write for that panel. Writers queue a
//! publish closure keyed by the publisher, and the scene engine flushes the
//! queue when it finishes or pauses.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

type Publish = Box<dyn FnOnce() + Send>;

struct Pending<K> {
    keys: HashSet<K>,
    jobs: Vec<Publish>,
}

impl<K> Default for Pending<K> {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
            jobs: Vec::new(),
        }
    }
}

/// Set of pending publish requests, at most one per publisher key.
pub struct IndicatorCoalescer<K> {
    pending: Mutex<Pending<K>>,
}

impl<K> Default for IndicatorCoalescer<K> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
        }
    }
}

impl<K: Eq + Hash> IndicatorCoalescer<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `publish` unless `key` is already queued this cycle.
    ///
    /// Returns `true` when the closure was queued.
    pub fn request(&self, key: K, publish: impl FnOnce() + Send + 'static) -> bool {
        let mut pending = self.lock();
        if !pending.keys.insert(key) {
            return false;
        }
        pending.jobs.push(Box::new(publish));
        true
    }

    /// Run every queued closure and start a new cycle. Returns how many ran.
    ///
    /// Closures run outside the lock, so they may queue new requests; those
    /// belong to the next cycle.
    pub fn flush_all(&self) -> usize {
        let jobs = std::mem::take(&mut *self.lock()).jobs;
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock().jobs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending<K>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
