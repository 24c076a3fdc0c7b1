use crate::builder::StashBuilder;
use crate::expiration::{Expiration, Expires};
use crate::metrics::MetricsSnapshot;
use crate::shared::StashShared;

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// A thread-safe stash of values under string keys, each with its own
/// expiration policy.
///
/// Cloning a `Stash` is cheap and yields another handle to the same entries.
/// Values are handed out as `Arc<V>`, so `V` does not need to be `Clone`.
///
/// # Single-flight loading
///
/// [`get_with`](Stash::get_with) and [`try_get_with`](Stash::try_get_with)
/// run their producer at most once per miss: concurrent callers for the same
/// key wait for the first one and then share its value. A producer may read
/// or load *other* keys of the same stash, but must never load its own key;
/// that call waits on itself forever.
pub struct Stash<V> {
  pub(crate) shared: Arc<StashShared<V>>,
}

impl<V> Clone for Stash<V> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<V> fmt::Debug for Stash<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stash")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<V> Default for Stash<V>
where
  V: Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<V> Stash<V> {
  /// Returns a builder to configure the default policy and sweep interval.
  pub fn builder() -> StashBuilder<V> {
    StashBuilder::new()
  }

  /// Returns `true` if something is stored under `key`, fresh or not.
  pub fn has(&self, key: &str) -> bool {
    self.shared.entries.has(key)
  }

  /// Removes `key` and its expiration bookkeeping.
  ///
  /// Returns `true` if an entry was removed; removing a missing key is a no-op.
  pub fn remove(&self, key: &str) -> bool {
    let removed = self.shared.remove(key);
    if removed {
      self.shared.metrics.removals.fetch_add(1, Ordering::Relaxed);
    }
    removed
  }

  /// Removes every entry.
  pub fn clear(&self) {
    self.shared.clear();
  }

  /// The number of stored entries, including stale ones not yet swept.
  pub fn len(&self) -> usize {
    self.shared.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.entries.is_empty()
  }

  /// The effective policy stored for `key`, with sentinels already resolved.
  pub fn expiration(&self, key: &str) -> Option<Expiration> {
    self.shared.expiration(key)
  }

  /// The policy substituted for [`Expires::Default`].
  pub fn default_expiration(&self) -> &Expiration {
    &self.shared.default_expiration
  }

  /// Returns `true` while the background sweeper is active.
  ///
  /// It runs only while at least one stored entry can expire.
  pub fn is_sweeping(&self) -> bool {
    self.shared.sweeper.is_running()
  }

  pub fn sweep_interval(&self) -> Duration {
    self.shared.sweeper.interval()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Looks `key` up, counting a hit when a value comes back.
  #[inline]
  fn lookup(&self, key: &str) -> Option<Arc<V>> {
    let value = self.shared.lookup(key);
    if value.is_some() {
      self.shared.metrics.hits.fetch_add(1, Ordering::Relaxed);
    }
    value
  }
}

impl<V> Stash<V>
where
  V: Send + Sync + 'static,
{
  /// Creates a stash whose entries never expire unless told otherwise,
  /// swept once per second.
  pub fn new() -> Self {
    Self {
      shared: StashBuilder::new().build_shared(),
    }
  }

  /// Returns the value stored under `key`, if any.
  ///
  /// If another caller is loading `key` right now, this waits for that load
  /// and returns its result. An entry whose custom condition reports it
  /// stale is dropped and `None` is returned.
  pub fn get(&self, key: &str) -> Option<Arc<V>> {
    if let Some(value) = self.lookup(key) {
      return Some(value);
    }

    let _key_guard = self.shared.key_locks.lock(key);
    let value = self.lookup(key);
    if value.is_none() {
      self.shared.metrics.misses.fetch_add(1, Ordering::Relaxed);
    }
    value
  }

  /// Returns the value stored under `key`, computing and storing it with
  /// `producer` on a miss.
  ///
  /// The producer returns the value together with its expiration; returning
  /// [`Expires::Default`] applies the stash's default policy.
  ///
  /// ```
  /// use fibre_stash::{expires, Stash};
  ///
  /// let stash = Stash::new();
  /// let value = stash.get_with("answer", || (42, expires().after_minutes(5)));
  /// assert_eq!(*value, 42);
  /// ```
  pub fn get_with<F, X>(&self, key: &str, producer: F) -> Arc<V>
  where
    F: FnOnce() -> (V, X),
    X: Into<Expires>,
  {
    match self.try_get_with(key, || Ok::<_, Infallible>(producer())) {
      Ok(value) => value,
      Err(never) => match never {},
    }
  }

  /// Like [`get_with`](Stash::get_with), for producers that can fail.
  ///
  /// A producer error is returned to this caller unchanged and nothing is
  /// stored, so the next call for `key` runs a producer again. Callers that
  /// were waiting on this load retry with their own producers.
  pub fn try_get_with<F, X, E>(&self, key: &str, producer: F) -> Result<Arc<V>, E>
  where
    F: FnOnce() -> Result<(V, X), E>,
    X: Into<Expires>,
  {
    // Fast path: no key lock.
    if let Some(value) = self.lookup(key) {
      return Ok(value);
    }

    // Slow path: serialize with every other loader of this key, then check
    // whether one of them finished while we waited.
    let _key_guard = self.shared.key_locks.lock(key);
    if let Some(value) = self.lookup(key) {
      return Ok(value);
    }

    self.shared.metrics.misses.fetch_add(1, Ordering::Relaxed);
    self.shared.metrics.loads.fetch_add(1, Ordering::Relaxed);

    match producer() {
      Ok((value, expires)) => Ok(
        self
          .shared
          .insert(key.to_owned(), Arc::new(value), expires.into()),
      ),
      Err(err) => {
        self
          .shared
          .metrics
          .load_failures
          .fetch_add(1, Ordering::Relaxed);
        debug!(key, "stash producer failed; nothing stored");
        Err(err)
      }
    }
  }

  /// Stores `value` under `key`, replacing any previous entry.
  ///
  /// Both timestamps of the new entry start now. Pass [`Expires::Default`] to
  /// use the stash's default policy.
  pub fn set(&self, key: impl Into<String>, value: V, expires: impl Into<Expires>) -> Arc<V> {
    self
      .shared
      .insert(key.into(), Arc::new(value), expires.into())
  }

  /// Replaces the expiration policy of an existing entry.
  ///
  /// Returns `false`, changing nothing, if `key` is not stored. The entry's
  /// timestamps are kept, so a new idle window counts from the last read.
  pub fn set_expires(&self, key: &str, expires: impl Into<Expires>) -> bool {
    self.shared.set_expires(key, expires.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expiration::expires;
  use std::cell::Cell;
  use std::panic::{self, AssertUnwindSafe};

  #[test]
  fn get_without_producer_reports_absence() {
    let stash: Stash<i32> = Stash::new();
    assert!(stash.get("missing").is_none());
    assert_eq!(stash.metrics().misses, 1);
    assert_eq!(stash.shared.key_locks.len(), 0);
  }

  #[test]
  fn permanent_entries_stay_out_of_the_index() {
    let stash = Stash::new();
    stash.set("forever", 1, Expires::Never);
    stash.set("default", 2, Expires::Default);
    assert_eq!(stash.shared.expirable.len(), 0);
    assert!(!stash.is_sweeping());

    stash.set("soon", 3, expires().after_hours(1));
    assert_eq!(stash.shared.expirable.len(), 1);
    assert!(stash.is_sweeping());
  }

  #[test]
  fn overwriting_with_never_clears_the_index() {
    let stash = Stash::new();
    stash.set("k", 1, expires().after_hours(1));
    assert!(stash.shared.expirable.has("k"));

    stash.set("k", 2, Expires::Never);
    assert!(!stash.shared.expirable.has("k"));
    assert_eq!(*stash.get("k").unwrap(), 2);
  }

  #[test]
  fn set_expires_moves_entries_in_and_out_of_the_index() {
    let stash = Stash::new();
    stash.set("k", 1, Expires::Never);

    assert!(stash.set_expires("k", expires().after_hours(1)));
    assert!(stash.shared.expirable.has("k"));
    assert!(stash.is_sweeping());

    assert!(stash.set_expires("k", Expires::Never));
    assert!(!stash.shared.expirable.has("k"));
    assert!(stash.expiration("k").unwrap().is_never());
  }

  #[test]
  fn set_expires_on_missing_key_fails_quietly() {
    let stash: Stash<i32> = Stash::new();
    assert!(!stash.set_expires("missing", expires().after_seconds(1)));
    assert!(!stash.has("missing"));
    assert_eq!(stash.shared.expirable.len(), 0);
  }

  #[test]
  fn failed_producer_leaves_nothing_behind() {
    let stash: Stash<i32> = Stash::new();
    let result = stash.try_get_with("k", || Err::<(i32, Expires), _>("unavailable"));
    assert_eq!(result.unwrap_err(), "unavailable");
    assert!(!stash.has("k"));
    assert_eq!(stash.shared.key_locks.len(), 0);

    let metrics = stash.metrics();
    assert_eq!(metrics.loads, 1);
    assert_eq!(metrics.load_failures, 1);
    assert_eq!(metrics.inserts, 0);
  }

  #[test]
  fn panicking_producer_releases_the_key() {
    let stash: Stash<i32> = Stash::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
      stash.get_with("k", || -> (i32, Expires) { panic!("producer failed") })
    }));

    assert!(result.is_err());
    assert!(!stash.has("k"));
    assert_eq!(stash.shared.key_locks.len(), 0);
    assert_eq!(*stash.get_with("k", || (2, Expires::Never)), 2);
  }

  #[test]
  fn producer_may_load_other_keys() {
    let stash: Stash<String> = Stash::new();
    let outer = stash.get_with("outer", || {
      let inner = stash.get_with("inner", || ("inner".to_string(), Expires::Never));
      (format!("outer+{inner}"), Expires::Never)
    });
    assert_eq!(outer.as_str(), "outer+inner");
    assert!(stash.has("inner"));
  }

  #[test]
  fn condition_stale_entry_is_reloaded_on_read() {
    let stash = Stash::new();
    let calls = Cell::new(0);
    let load = || {
      calls.set(calls.get() + 1);
      (calls.get(), expires().on_condition(|| true))
    };

    assert_eq!(*stash.get_with("k", load), 1);
    assert_eq!(*stash.get_with("k", load), 2);
    assert_eq!(stash.metrics().evicted_by_condition, 1);
  }

  #[test]
  fn remove_counts_only_real_removals() {
    let stash = Stash::new();
    stash.set("k", 1, Expires::Never);
    assert!(stash.remove("k"));
    assert!(!stash.remove("k"));
    assert_eq!(stash.metrics().removals, 1);
  }

  #[test]
  fn clear_empties_both_maps() {
    let stash = Stash::new();
    stash.set("a", 1, Expires::Never);
    stash.set("b", 2, expires().after_hours(1));
    stash.clear();
    assert!(stash.is_empty());
    assert_eq!(stash.shared.expirable.len(), 0);
  }
}
