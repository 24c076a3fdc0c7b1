#![allow(dead_code)]

use fibre_stash::{Expires, Stash};
use std::time::Duration;

/// Sweeper tick used by the time-based tests.
pub const SWEEP_TICK: Duration = Duration::from_millis(10);
/// A lifetime comfortably longer than a tick.
pub const TINY_TTL: Duration = Duration::from_millis(100);
/// Extra time granted on top of a deadline before asserting eviction.
pub const SLEEP_MARGIN: Duration = Duration::from_millis(150);

/// A stash with a fast sweeper and a permanent default policy.
pub fn build_test_stash<V>() -> Stash<V>
where
  V: Send + Sync + 'static,
{
  Stash::builder()
    .sweep_interval(SWEEP_TICK)
    .build()
    .unwrap()
}

/// A stash with a fast sweeper and the given default policy.
pub fn build_test_stash_with_default<V>(default: impl Into<Expires>) -> Stash<V>
where
  V: Send + Sync + 'static,
{
  Stash::builder()
    .default_expiration(default)
    .sweep_interval(SWEEP_TICK)
    .build()
    .unwrap()
}
