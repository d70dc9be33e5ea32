//! In-process latency metrics.
//!
//! [`MetricRegistry`] is the sink: it hands out one shared [`Timer`] per
//! name. [`timers::TimerCache`] sits in front of it and keys timers by
//! `(policy, repository)` for the browse paths.

pub mod timers;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

pub use timers::{TimerCache, TimerKey};

/// Accumulating latency timer. Updates are lock-free.
#[derive(Debug)]
pub struct Timer {
    name: String,
    count: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
    pub mean_nanos: u64,
}

impl Timer {
    fn new(name: String) -> Self {
        Self {
            name,
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let count = self.count();
        let total_nanos = self.total_nanos.load(Ordering::Relaxed);
        let min_nanos = match self.min_nanos.load(Ordering::Relaxed) {
            u64::MAX => 0,
            n => n,
        };
        TimerSnapshot {
            count,
            total_nanos,
            min_nanos,
            max_nanos: self.max_nanos.load(Ordering::Relaxed),
            mean_nanos: total_nanos.checked_div(count).unwrap_or(0),
        }
    }
}

/// Named timers, created on first request and kept for the process
/// lifetime. Asking twice for the same name yields the same instance.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    timers: Mutex<HashMap<String, Arc<Timer>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer(&self, name: &str) -> Arc<Timer> {
        let mut timers = self.timers.lock();
        if let Some(timer) = timers.get(name) {
            return Arc::clone(timer);
        }
        let timer = Arc::new(Timer::new(name.to_string()));
        timers.insert(name.to_string(), Arc::clone(&timer));
        timer
    }

    pub fn get(&self, name: &str) -> Option<Arc<Timer>> {
        self.timers.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> BTreeMap<String, TimerSnapshot> {
        self.timers
            .lock()
            .iter()
            .map(|(name, timer)| (name.clone(), timer.snapshot()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}
