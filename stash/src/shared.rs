use crate::entry::{EntryMeta, StashEntry};
use crate::expiration::{Expiration, Expires};
use crate::lock_table::KeyLockTable;
use crate::metrics::Metrics;
use crate::store::LockedMap;
use crate::task::sweeper::Sweeper;

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

/// The internal, thread-safe core of the stash.
///
/// Lock order, wherever more than one is held: `entries`, then `expirable`.
/// The sweeper state lock and the key lock table are never taken while either
/// map is locked.
pub(crate) struct StashShared<V> {
  /// Every entry, permanent or not.
  pub(crate) entries: LockedMap<StashEntry<V>>,
  /// Mirror of the entries whose policy can expire; all the sweeper scans.
  pub(crate) expirable: LockedMap<Arc<EntryMeta>>,
  pub(crate) key_locks: KeyLockTable,
  pub(crate) default_expiration: Expiration,
  pub(crate) sweeper: Sweeper,
  pub(crate) metrics: Metrics,
}

impl<V> fmt::Debug for StashShared<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StashShared")
      .field("entries", &self.entries.len())
      .field("expirable", &self.expirable.len())
      .field("key_locks", &self.key_locks)
      .field("default_expiration", &self.default_expiration)
      .field("sweeping", &self.sweeper.is_running())
      .field("metrics", &self.metrics.snapshot())
      .finish()
  }
}

impl<V> StashShared<V> {
  pub(crate) fn new(default_expiration: Expiration, sweep_interval: Duration) -> Self {
    Self {
      entries: LockedMap::new(),
      expirable: LockedMap::new(),
      key_locks: KeyLockTable::new(),
      default_expiration,
      sweeper: Sweeper::new(sweep_interval),
      metrics: Metrics::new(),
    }
  }

  #[inline]
  pub(crate) fn resolve(&self, expires: Expires) -> Expiration {
    expires.resolve(&self.default_expiration)
  }

  /// The read path shared by the fast check and the re-check under the key
  /// lock.
  ///
  /// Only the custom condition is evaluated here; time-based staleness is the
  /// sweeper's job. A condition-stale entry is dropped and reported as a miss.
  /// A hit refreshes the entry's last access time.
  pub(crate) fn lookup(&self, key: &str) -> Option<Arc<V>> {
    let entry = self.entries.get(key)?;

    // The condition is user code: run it with no lock held.
    if entry.meta.is_expired_by_condition() {
      if self.remove_if_current(key, &entry.meta) {
        self
          .metrics
          .evicted_by_condition
          .fetch_add(1, Ordering::Relaxed);
        trace!(key, "dropped entry on read: expiration condition met");
      }
      return None;
    }

    entry.meta.touch();
    Some(entry.value)
  }

  /// Removes `key` from both maps, returning `true` if an entry was stored.
  pub(crate) fn remove(&self, key: &str) -> bool {
    let mut entries = self.entries.write();
    let mut index = self.expirable.write();
    index.remove(key);
    entries.remove(key).is_some()
  }

  /// Removes `key` from both maps, but only while they still hold the entry
  /// described by `meta`. An entry rewritten in the meantime survives.
  pub(crate) fn remove_if_current(&self, key: &str, meta: &Arc<EntryMeta>) -> bool {
    let mut entries = self.entries.write();
    let mut index = self.expirable.write();
    Self::remove_locked(&mut entries, &mut index, key, meta)
  }

  /// Batch form of `remove_if_current` used by the sweeper: both write locks
  /// are taken once for the whole batch.
  pub(crate) fn evict_stale(&self, stale: &[(String, Arc<EntryMeta>)]) -> u64 {
    let mut entries = self.entries.write();
    let mut index = self.expirable.write();

    let mut evicted = 0;
    for (key, meta) in stale {
      if Self::remove_locked(&mut entries, &mut index, key, meta) {
        trace!(key = %key, "swept expired entry");
        evicted += 1;
      }
    }
    evicted
  }

  fn remove_locked(
    entries: &mut ahash::HashMap<String, StashEntry<V>>,
    index: &mut ahash::HashMap<String, Arc<EntryMeta>>,
    key: &str,
    meta: &Arc<EntryMeta>,
  ) -> bool {
    if index.get(key).is_some_and(|indexed| Arc::ptr_eq(indexed, meta)) {
      index.remove(key);
    }
    if entries.get(key).is_some_and(|entry| entry.is(meta)) {
      entries.remove(key);
      true
    } else {
      false
    }
  }

  /// The effective policy stored for `key`.
  pub(crate) fn expiration(&self, key: &str) -> Option<Expiration> {
    self
      .entries
      .get(key)
      .map(|entry| entry.meta.expiration().clone())
  }

  pub(crate) fn clear(&self) {
    let mut entries = self.entries.write();
    let mut index = self.expirable.write();
    index.clear();
    entries.clear();
  }
}

impl<V> StashShared<V>
where
  V: Send + Sync + 'static,
{
  /// Writes a fresh entry, keeps the expirable index in step with it, and
  /// wakes the sweeper if the entry can expire.
  pub(crate) fn insert(self: &Arc<Self>, key: String, value: Arc<V>, expires: Expires) -> Arc<V> {
    let expiration = self.resolve(expires);
    let expirable = expiration.can_expire();
    let entry = StashEntry::new(value.clone(), expiration);

    {
      let mut entries = self.entries.write();
      let mut index = self.expirable.write();
      if expirable {
        index.insert(key.clone(), entry.meta.clone());
      } else {
        // An overwritten expirable entry must not linger in the index.
        index.remove(&key);
      }
      entries.insert(key, entry);
    }
    self.metrics.inserts.fetch_add(1, Ordering::Relaxed);

    // Published to the index above, with the map locks released.
    if expirable {
      self.sweeper.start_if_needed(self);
    }
    value
  }

  /// Replaces the policy of an existing entry. Returns `false` if the key is
  /// absent.
  pub(crate) fn set_expires(self: &Arc<Self>, key: &str, expires: Expires) -> bool {
    let expiration = self.resolve(expires);
    let expirable = expiration.can_expire();

    {
      let mut entries = self.entries.write();
      let Some(entry) = entries.get_mut(key) else {
        return false;
      };
      let meta = Arc::new(entry.meta.with_expiration(expiration));
      entry.meta = meta.clone();

      let mut index = self.expirable.write();
      if expirable {
        index.insert(key.to_owned(), meta);
      } else {
        index.remove(key);
      }
    }

    if expirable {
      self.sweeper.start_if_needed(self);
    }
    true
  }
}
