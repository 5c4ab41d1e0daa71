//! In-memory keyed store with atomic conditional writes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::{Dependency, DependencyError};
use crate::ports::store::{KeyedStore, Record};

use super::{lock, take_failure};

/// A [`KeyedStore`] over a `BTreeMap` behind one mutex.
///
/// Each operation holds the lock for its whole duration, so conditional
/// writes are atomic with respect to each other exactly as a real
/// compare-and-swap store guarantees.
///
/// With [`MemoryStore::interleave`] on, every operation first yields to the
/// scheduler, so concurrent handlers on one runtime thread interleave
/// between their reads and writes like clients of a remote store do.
/// [`MemoryStore::hold`] parks every operation until
/// [`MemoryStore::release`].
pub struct MemoryStore<V: Record> {
    inner: Arc<StoreInner<V>>,
}

struct StoreInner<V: Record> {
    rows: Mutex<BTreeMap<V::Key, V>>,
    fail_next: Mutex<u32>,
    interleave: AtomicBool,
    held: watch::Sender<bool>,
}

impl<V: Record> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        MemoryStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Record> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Record> MemoryStore<V> {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        MemoryStore {
            inner: Arc::new(StoreInner {
                rows: Mutex::new(BTreeMap::new()),
                fail_next: Mutex::new(0),
                interleave: AtomicBool::new(false),
                held,
            }),
        }
    }

    /// Inserts a row directly, bypassing conditional checks.
    pub fn seed(&self, value: V) {
        lock(&self.inner.rows).insert(value.key(), value);
    }

    /// Makes the next `n` operations fail with a retryable error.
    pub fn fail_next(&self, n: u32) {
        *lock(&self.inner.fail_next) = n;
    }

    /// Makes every operation yield before touching the rows.
    pub fn interleave(&self, on: bool) {
        self.inner.interleave.store(on, Ordering::SeqCst);
    }

    /// Parks every operation until [`release`](Self::release).
    pub fn hold(&self) {
        self.inner.held.send_replace(true);
    }

    pub fn release(&self) {
        self.inner.held.send_replace(false);
    }

    /// Returns a copy of the stored row, bypassing fault injection.
    pub fn peek(&self, key: &V::Key) -> Option<V> {
        lock(&self.inner.rows).get(key).cloned()
    }

    /// Returns all rows in key order.
    pub fn rows(&self) -> Vec<V> {
        lock(&self.inner.rows).values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn check_fault(&self, op: &str) -> Result<(), DependencyError> {
        if self.inner.interleave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        let mut gate = self.inner.held.subscribe();
        if gate.wait_for(|held| !*held).await.is_err() {
            return Err(DependencyError::retryable(
                Dependency::Store,
                format!("store closed during {op}"),
            ));
        }
        if take_failure(&self.inner.fail_next) {
            return Err(DependencyError::retryable(
                Dependency::Store,
                format!("injected failure during {op}"),
            ));
        }
        Ok(())
    }
}

impl<V: Record> KeyedStore<V> for MemoryStore<V> {
    async fn get(&self, key: &V::Key) -> Result<Option<V>, DependencyError> {
        self.check_fault("get").await?;
        Ok(lock(&self.inner.rows).get(key).cloned())
    }

    async fn put_if_absent(&self, value: V) -> Result<bool, DependencyError> {
        self.check_fault("put_if_absent").await?;
        let mut rows = lock(&self.inner.rows);
        let key = value.key();
        if rows.contains_key(&key) {
            return Ok(false);
        }
        rows.insert(key, value);
        Ok(true)
    }

    async fn put_if_matches(&self, value: V, expected: V::Status) -> Result<bool, DependencyError> {
        self.check_fault("put_if_matches").await?;
        let mut rows = lock(&self.inner.rows);
        let key = value.key();
        match rows.get(&key) {
            Some(current) if current.status() == expected => {
                let mut value = value;
                value.absorb_stored(current);
                rows.insert(key, value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_variants(
        &self,
        key: &V::Key,
        urls: &BTreeSet<String>,
    ) -> Result<Option<V>, DependencyError> {
        self.check_fault("append_variants").await?;
        let mut rows = lock(&self.inner.rows);
        Ok(rows.get_mut(key).map(|current| {
            current.append_variants(urls);
            current.clone()
        }))
    }

    async fn put(&self, value: V) -> Result<(), DependencyError> {
        self.check_fault("put").await?;
        let mut value = value;
        let mut rows = lock(&self.inner.rows);
        if let Some(current) = rows.get(&value.key()) {
            value.absorb_stored(current);
        }
        rows.insert(value.key(), value);
        Ok(())
    }

    async fn delete(&self, key: &V::Key) -> Result<(), DependencyError> {
        self.check_fault("delete").await?;
        lock(&self.inner.rows).remove(key);
        Ok(())
    }

    async fn query(&self, index: &V::Index) -> Result<Vec<V>, DependencyError> {
        self.check_fault("query").await?;
        Ok(lock(&self.inner.rows)
            .values()
            .filter(|v| v.matches(index))
            .cloned()
            .collect())
    }
}
