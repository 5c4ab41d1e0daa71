//! Durable keyed storage.
//!
//! All correctness-critical transitions go through the two conditional puts.
//! A conditional put that returns `false` means another writer got there
//! first; callers treat that as a no-op, never as an error.
//!
//! A record's variant set is grow-only. Every overwrite folds in the stored
//! set ([`Record::absorb_stored`]) and additions go through the atomic
//! [`KeyedStore::append_variants`], so concurrent writers never drop a URL.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use crate::error::DependencyError;

/// A value that can live in a [`KeyedStore`].
pub trait Record: Clone + Send + Sync + 'static {
    /// Primary key, derived from the value itself.
    type Key: Clone + Eq + Hash + Ord + Debug + Send + Sync;

    /// The field conditional writes compare against.
    type Status: Copy + Eq + Debug + Send + Sync;

    /// Secondary lookups supported by the store.
    type Index: Debug + Send + Sync;

    fn key(&self) -> Self::Key;

    fn status(&self) -> Self::Status;

    /// Whether this value belongs to the given secondary-index lookup.
    fn matches(&self, index: &Self::Index) -> bool;

    /// Adds URLs to the value's variant set. Values without one ignore this.
    fn append_variants(&mut self, _urls: &BTreeSet<String>) {}

    /// Folds grow-only fields of `stored` into a value about to replace it.
    fn absorb_stored(&mut self, _stored: &Self) {}
}

/// Keyed storage with compare-and-swap style conditional writes.
///
/// # Example (test double)
///
/// ```ignore
/// let store = MemoryStore::<StatusRecord>::new();
/// assert!(store.put_if_absent(record.clone()).await?);
/// assert!(!store.put_if_absent(record).await?); // already there
/// ```
pub trait KeyedStore<V: Record>: Send + Sync {
    fn get(&self, key: &V::Key) -> impl Future<Output = Result<Option<V>, DependencyError>> + Send;

    /// Writes `value` only if nothing is stored under its key.
    fn put_if_absent(&self, value: V) -> impl Future<Output = Result<bool, DependencyError>> + Send;

    /// Writes `value` only if a value is stored under its key and that value's
    /// status equals `expected`.
    fn put_if_matches(
        &self,
        value: V,
        expected: V::Status,
    ) -> impl Future<Output = Result<bool, DependencyError>> + Send;

    /// Atomically adds `urls` to the variant set of the value stored under
    /// `key`, returning the updated value. `None` if nothing is stored.
    fn append_variants(
        &self,
        key: &V::Key,
        urls: &BTreeSet<String>,
    ) -> impl Future<Output = Result<Option<V>, DependencyError>> + Send;

    /// Unconditional upsert.
    fn put(&self, value: V) -> impl Future<Output = Result<(), DependencyError>> + Send;

    fn delete(&self, key: &V::Key) -> impl Future<Output = Result<(), DependencyError>> + Send;

    fn query(&self, index: &V::Index) -> impl Future<Output = Result<Vec<V>, DependencyError>> + Send;
}
