//! Per `(policy, repository)` timer cache.
//!
//! The map is split into shards chosen by an FxHash of the key, each behind
//! its own `RwLock`. Lookups for existing keys only take a shard read lock;
//! creation re-checks under the shard write lock, so racing callers for the
//! same key always end up sharing one timer. Entries are never evicted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{MetricRegistry, Timer};

const SHARDS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub policy: String,
    pub repository: String,
}

impl TimerKey {
    pub fn new(policy: &str, repository: &str) -> Self {
        Self {
            policy: policy.to_string(),
            repository: repository.to_string(),
        }
    }
}

pub struct TimerCache {
    registry: Arc<MetricRegistry>,
    prefix: String,
    shards: Vec<RwLock<HashMap<TimerKey, Arc<Timer>>>>,
}

impl TimerCache {
    /// Timers are registered as `<prefix>.<policy>.<repository>.timer`.
    pub fn new(registry: Arc<MetricRegistry>, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn timer_name(&self, policy: &str, repository: &str) -> String {
        format!("{}.{policy}.{repository}.timer", self.prefix)
    }

    fn shard(&self, key: &TimerKey) -> &RwLock<HashMap<TimerKey, Arc<Timer>>> {
        let hash = fxhash::hash64(key);
        &self.shards[(hash % SHARDS as u64) as usize]
    }

    pub fn get_or_create(&self, policy: &str, repository: &str) -> Arc<Timer> {
        let key = TimerKey::new(policy, repository);
        let shard = self.shard(&key);
        if let Some(timer) = shard.read().get(&key) {
            return Arc::clone(timer);
        }
        let mut entries = shard.write();
        Arc::clone(
            entries
                .entry(key)
                .or_insert_with_key(|k| self.registry.timer(&self.timer_name(&k.policy, &k.repository))),
        )
    }

    pub fn get(&self, policy: &str, repository: &str) -> Option<Arc<Timer>> {
        let key = TimerKey::new(policy, repository);
        self.shard(&key).read().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
