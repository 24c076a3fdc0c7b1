use core::fmt;
use std::sync::Arc;

use ahash::HashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Per-key mutexes used to serialize "compute and store" for one key.
///
/// A key's mutex only lives in the table while somebody holds or waits on it.
/// The table therefore grows with the number of keys being loaded right now,
/// not with the number of keys ever loaded.
#[derive(Default)]
pub(crate) struct KeyLockTable {
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for KeyLockTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyLockTable")
      .field("in_flight", &self.len())
      .finish()
  }
}

impl KeyLockTable {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Blocks until the caller holds the mutex for `key`.
  ///
  /// The lock is released, and the table entry pruned if nobody else is
  /// waiting, when the returned guard is dropped. That includes unwinding out
  /// of a panicking producer.
  pub(crate) fn lock(&self, key: &str) -> KeyGuard<'_> {
    // Clone the key's mutex out of the table so that the table lock is not
    // held while waiting for the key.
    let key_lock = {
      let mut locks = self.locks.lock();
      match locks.get(key) {
        Some(existing) => existing.clone(),
        None => {
          let fresh = Arc::new(Mutex::new(()));
          locks.insert(key.to_owned(), fresh.clone());
          fresh
        }
      }
    };

    let guard = key_lock.lock_arc();
    KeyGuard {
      table: self,
      key: key.to_owned(),
      guard: Some(guard),
    }
  }

  /// The number of keys currently locked or waited on.
  pub(crate) fn len(&self) -> usize {
    self.locks.lock().len()
  }

  /// Drops the table entry for `key` if the table holds the only reference.
  ///
  /// References are only ever cloned while the table lock is held, so the
  /// count cannot grow behind our back here.
  fn prune(&self, key: &str) {
    let mut locks = self.locks.lock();
    if let Some(key_lock) = locks.get(key) {
      if Arc::strong_count(key_lock) == 1 {
        locks.remove(key);
      }
    }
  }
}

/// Holds a key's mutex; see [`KeyLockTable::lock`].
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub(crate) struct KeyGuard<'a> {
  table: &'a KeyLockTable,
  key: String,
  guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for KeyGuard<'_> {
  fn drop(&mut self) {
    // Unlock first so our reference no longer counts against pruning.
    drop(self.guard.take());
    self.table.prune(&self.key);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Barrier;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn uncontended_lock_is_pruned_on_release() {
    let table = KeyLockTable::new();
    {
      let _guard = table.lock("a");
      assert_eq!(table.len(), 1);
    }
    assert_eq!(table.len(), 0);
  }

  #[test]
  fn different_keys_do_not_block_each_other() {
    let table = KeyLockTable::new();
    let _a = table.lock("a");
    let _b = table.lock("b");
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn same_key_is_mutually_exclusive() {
    let table = Arc::new(KeyLockTable::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let table = table.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
          barrier.wait();
          let _guard = table.lock("shared");
          let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
          max_inside.fetch_max(now, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(5));
          inside.fetch_sub(1, Ordering::SeqCst);
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(table.len(), 0, "the table should be empty once everyone is done");
  }

  #[test]
  fn guard_released_by_panic_is_pruned() {
    let table = Arc::new(KeyLockTable::new());
    let result = thread::spawn({
      let table = table.clone();
      move || {
        let _guard = table.lock("boom");
        panic!("producer failed");
      }
    })
    .join();

    assert!(result.is_err());
    assert_eq!(table.len(), 0);
    // The key can be locked again.
    let _guard = table.lock("boom");
  }
}
