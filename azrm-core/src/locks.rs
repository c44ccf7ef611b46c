//! Named locks - serializing operations that share a parent resource
//!
//! The management API is not transactional across sibling sub-resources
//! (e.g. the rule collection groups of one firewall policy), so mutating
//! operations on them take a lock keyed on the parent first. Locks are
//! released when the returned guard is dropped, on every exit path.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Conventional lock key for a resource: `<resource-type>.<resource-name>`
pub fn lock_key(resource_type: &str, name: &str) -> String {
    format!("{}.{}", resource_type, name)
}

/// Keyed mutex table
///
/// Entries are created on first use and never removed. Keys are
/// case-sensitive. Acquiring a key already held by the same caller deadlocks.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(key) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    /// Wait until no one else holds `key`, then hold it until the guard drops
    pub async fn lock(&self, key: impl Into<String>) -> NamedLockGuard {
        let key = key.into();
        let mutex = self.mutex_for(&key);
        debug!("acquiring lock {:?}", key);
        let guard = mutex.lock_owned().await;
        debug!("acquired lock {:?}", key);
        NamedLockGuard { key, _guard: guard }
    }

    /// Blocking variant of [`LockRegistry::lock`] for plain threads
    ///
    /// Panics if called from within an async execution context.
    pub fn lock_blocking(&self, key: impl Into<String>) -> NamedLockGuard {
        let key = key.into();
        let mutex = self.mutex_for(&key);
        debug!("acquiring lock {:?}", key);
        let guard = mutex.blocking_lock_owned();
        debug!("acquired lock {:?}", key);
        NamedLockGuard { key, _guard: guard }
    }

    /// Lock the resource `name` of `resource_type`
    pub async fn by_name(&self, name: &str, resource_type: &str) -> NamedLockGuard {
        self.lock(lock_key(resource_type, name)).await
    }

    /// Lock on a full resource ID
    ///
    /// IDs start with `/`, so these keys never collide with [`lock_key`] keys:
    /// `by_id` and `by_name` on the same resource do not exclude each other.
    pub async fn by_id(&self, id: &str) -> NamedLockGuard {
        self.lock(id).await
    }

    /// Lock several resources of one type
    ///
    /// Keys are taken in sorted order with duplicates removed, so callers
    /// locking overlapping sets cannot deadlock each other.
    pub async fn multiple_by_name<S: AsRef<str>>(
        &self,
        names: &[S],
        resource_type: &str,
    ) -> NamedLockSet {
        let mut keys: Vec<String> = names
            .iter()
            .map(|name| lock_key(resource_type, name.as_ref()))
            .collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        NamedLockSet { guards }
    }

    /// Number of keys ever locked through this registry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds a named lock until dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct NamedLockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        debug!("releasing lock {:?}", self.key);
    }
}

/// Several named locks released together
#[must_use = "the locks are released as soon as the set is dropped"]
#[derive(Debug)]
pub struct NamedLockSet {
    guards: Vec<NamedLockGuard>,
}

impl NamedLockSet {
    /// Keys held, in acquisition order
    pub fn keys(&self) -> Vec<&str> {
        self.guards.iter().map(|g| g.key()).collect()
    }
}
