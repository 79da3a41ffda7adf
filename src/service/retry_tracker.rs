use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::Direction;

/// Identifies one capture sequence: a camera (its `device_id`, or its peer
/// address when it sends none) pointed at one lane direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetryKey {
    device: String,
    direction: Direction,
}

impl RetryKey {
    pub fn new(device: impl Into<String>, direction: Direction) -> Self {
        Self {
            device: device.into(),
            direction,
        }
    }
}

impl fmt::Display for RetryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.direction)
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    touched: Instant,
}

/// Unclear-image counters per capture sequence.
///
/// Increments for one key are serialized by the map's entry lock. A counter
/// that sees no activity for `ttl` starts over from zero.
#[derive(Debug)]
pub struct RetryTracker {
    counters: DashMap<RetryKey, Counter>,
    ttl: Duration,
}

impl RetryTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            ttl,
        }
    }

    /// Records one more unclear frame and returns the updated count.
    pub fn register_unclear(&self, key: &RetryKey) -> u32 {
        self.register_unclear_at(key, Instant::now())
    }

    pub fn reset(&self, key: &RetryKey) {
        self.counters.remove(key);
    }

    /// Current count, zero when unknown or expired.
    pub fn count(&self, key: &RetryKey) -> u32 {
        self.count_at(key, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn register_unclear_at(&self, key: &RetryKey, now: Instant) -> u32 {
        self.purge_expired(now);
        let mut entry = self.counters.entry(key.clone()).or_insert(Counter {
            count: 0,
            touched: now,
        });
        if now.duration_since(entry.touched) > self.ttl {
            entry.count = 0;
        }
        entry.count += 1;
        entry.touched = now;
        entry.count
    }

    fn count_at(&self, key: &RetryKey, now: Instant) -> u32 {
        self.counters
            .get(key)
            .filter(|c| now.duration_since(c.touched) <= self.ttl)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    fn purge_expired(&self, now: Instant) {
        let ttl = self.ttl;
        self.counters
            .retain(|_, c| now.duration_since(c.touched) <= ttl);
    }
}
