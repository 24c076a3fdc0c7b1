use crate::expiration::Expiration;
use crate::time;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The bookkeeping half of a stashed entry.
///
/// It is shared between the entry store and the expirable index, so a read
/// that refreshes `last_accessed` is immediately visible to the sweeper.
#[derive(Debug)]
pub(crate) struct EntryMeta {
  created: Instant,
  /// Nanoseconds since the stash epoch, see `time::instant_to_nanos`.
  last_accessed: AtomicU64,
  expiration: Expiration,
}

impl EntryMeta {
  pub(crate) fn new(expiration: Expiration) -> Self {
    let now = time::now();
    Self {
      created: now,
      last_accessed: AtomicU64::new(time::instant_to_nanos(now)),
      expiration,
    }
  }

  /// Copies the timestamps of `self` under a different policy.
  pub(crate) fn with_expiration(&self, expiration: Expiration) -> Self {
    Self {
      created: self.created,
      last_accessed: AtomicU64::new(self.last_accessed.load(Ordering::Relaxed)),
      expiration,
    }
  }

  #[inline]
  pub(crate) fn expiration(&self) -> &Expiration {
    &self.expiration
  }

  #[inline]
  pub(crate) fn created(&self) -> Instant {
    self.created
  }

  #[inline]
  pub(crate) fn last_accessed(&self) -> Instant {
    time::nanos_to_instant(self.last_accessed.load(Ordering::Relaxed))
  }

  /// Marks the entry as read just now, restarting any idle window.
  #[inline]
  pub(crate) fn touch(&self) {
    self
      .last_accessed
      .store(time::instant_to_nanos(time::now()), Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn is_expired(&self, now: Instant) -> bool {
    self
      .expiration
      .is_expired(now, self.created(), self.last_accessed())
  }

  #[inline]
  pub(crate) fn is_expired_by_condition(&self) -> bool {
    self.expiration.is_expired_by_condition()
  }
}

/// A value in the entry store together with its metadata.
#[derive(Debug)]
pub(crate) struct StashEntry<V> {
  pub(crate) value: Arc<V>,
  pub(crate) meta: Arc<EntryMeta>,
}

impl<V> StashEntry<V> {
  pub(crate) fn new(value: Arc<V>, expiration: Expiration) -> Self {
    Self {
      value,
      meta: Arc::new(EntryMeta::new(expiration)),
    }
  }

  /// Returns `true` if this entry is the one described by `meta`.
  #[inline]
  pub(crate) fn is(&self, meta: &Arc<EntryMeta>) -> bool {
    Arc::ptr_eq(&self.meta, meta)
  }
}

// Manual impl: cloning an entry only bumps two reference counts and must not
// require `V: Clone`.
impl<V> Clone for StashEntry<V> {
  fn clone(&self) -> Self {
    Self {
      value: self.value.clone(),
      meta: self.meta.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expiration::expires;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn touch_moves_last_access_forward() {
    let meta = EntryMeta::new(expires().after_seconds_idle(60));
    let before = meta.last_accessed();
    assert_eq!(before, meta.created());

    thread::sleep(Duration::from_millis(5));
    meta.touch();
    assert!(meta.last_accessed() > before);
    assert_eq!(meta.created(), before);
  }

  #[test]
  fn re_expiration_keeps_timestamps() {
    let meta = EntryMeta::new(Expiration::never());
    meta.touch();
    let swapped = meta.with_expiration(expires().after_seconds(1));

    assert_eq!(swapped.created(), meta.created());
    assert_eq!(swapped.last_accessed(), meta.last_accessed());
    assert!(swapped.expiration().can_expire());
    assert!(meta.expiration().is_never());
  }

  #[test]
  fn identity_follows_the_metadata() {
    let entry = StashEntry::new(Arc::new(1), Expiration::never());
    let copy = entry.clone();
    let other = StashEntry::new(Arc::new(1), Expiration::never());

    assert!(copy.is(&entry.meta));
    assert!(!other.is(&entry.meta));
  }
}
