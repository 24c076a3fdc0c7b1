use core::fmt;

use ahash::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A string-keyed map guarded by a single reader/writer lock.
///
/// The stash keeps two of these: the entry store (every entry) and the
/// expirable index (only entries whose policy can expire). Individual
/// operations are atomic with respect to each other. Operations that must
/// keep both maps consistent take `write()` on each, always in the order
/// entry store first, expirable index second.
pub(crate) struct LockedMap<T> {
  map: RwLock<HashMap<String, T>>,
}

impl<T> fmt::Debug for LockedMap<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LockedMap")
      .field("len", &self.len())
      .finish()
  }
}

impl<T> Default for LockedMap<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> LockedMap<T> {
  pub(crate) fn new() -> Self {
    Self {
      map: RwLock::new(HashMap::default()),
    }
  }

  /// Returns a clone of the value stored under `key`.
  #[inline]
  pub(crate) fn get(&self, key: &str) -> Option<T>
  where
    T: Clone,
  {
    self.map.read().get(key).cloned()
  }

  /// Presence only; says nothing about freshness.
  #[inline]
  pub(crate) fn has(&self, key: &str) -> bool {
    self.map.read().contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.map.read().len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.map.read().is_empty()
  }

  /// Acquires the shared lock for a multi-key scan.
  pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<String, T>> {
    self.map.read()
  }

  /// Acquires the exclusive lock for a multi-step update.
  pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, T>> {
    self.map.write()
  }
}
