use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

// The single, static reference point for the stash's packed timestamps.
static STASH_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the current time, making sure the epoch is pinned first so every
/// instant handed out afterwards can be packed without saturating.
#[inline]
pub(crate) fn now() -> Instant {
  Lazy::force(&STASH_EPOCH);
  Instant::now()
}

/// Packs an `Instant` into nanoseconds since the stash epoch.
#[inline]
pub(crate) fn instant_to_nanos(instant: Instant) -> u64 {
  instant.saturating_duration_since(*STASH_EPOCH).as_nanos() as u64
}

/// Unpacks nanoseconds since the stash epoch back into an `Instant`.
#[inline]
pub(crate) fn nanos_to_instant(nanos: u64) -> Instant {
  *STASH_EPOCH + Duration::from_nanos(nanos)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn packed_instants_survive_the_trip() {
    let instant = now() + Duration::from_millis(5);
    let unpacked = nanos_to_instant(instant_to_nanos(instant));
    assert_eq!(unpacked, instant);
  }
}
