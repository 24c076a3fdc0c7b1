use crate::error::BuildError;
use crate::expiration::{Expiration, Expires};
use crate::handles::Stash;
use crate::shared::StashShared;

use core::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// How often the sweeper scans for expired entries unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A builder for creating [`Stash`] instances.
///
/// Everything configured here is fixed for the lifetime of the stash.
pub struct StashBuilder<V> {
  default_expiration: Expiration,
  sweep_interval: Duration,
  _value_marker: PhantomData<fn() -> V>,
}

impl<V> fmt::Debug for StashBuilder<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StashBuilder")
      .field("default_expiration", &self.default_expiration)
      .field("sweep_interval", &self.sweep_interval)
      .finish()
  }
}

impl<V> Default for StashBuilder<V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<V> StashBuilder<V> {
  /// Creates a builder whose stash never expires entries by default and
  /// sweeps once per [`DEFAULT_SWEEP_INTERVAL`].
  pub fn new() -> Self {
    Self {
      default_expiration: Expiration::never(),
      sweep_interval: DEFAULT_SWEEP_INTERVAL,
      _value_marker: PhantomData,
    }
  }

  /// Sets the policy substituted whenever a write passes [`Expires::Default`].
  ///
  /// Passing `Expires::Default` here means "never".
  pub fn default_expiration(mut self, expires: impl Into<Expires>) -> Self {
    self.default_expiration = expires.into().resolve(&Expiration::never());
    self
  }

  /// Sets how often the background sweeper scans for expired entries.
  ///
  /// Shorter intervals evict closer to the deadline at the cost of more
  /// frequent scans of the expirable entries.
  pub fn sweep_interval(mut self, interval: Duration) -> Self {
    self.sweep_interval = interval;
    self
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.sweep_interval.is_zero() {
      return Err(BuildError::ZeroSweepInterval);
    }
    Ok(())
  }

  /// Constructs the shared core without validating.
  pub(crate) fn build_shared(self) -> Arc<StashShared<V>> {
    Arc::new(StashShared::new(self.default_expiration, self.sweep_interval))
  }
}

impl<V> StashBuilder<V>
where
  V: Send + Sync + 'static,
{
  /// Builds the stash. No background thread is started until an entry that
  /// can expire is written.
  pub fn build(self) -> Result<Stash<V>, BuildError> {
    self.validate()?;
    Ok(Stash {
      shared: self.build_shared(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expiration::expires;

  #[test]
  fn zero_sweep_interval_is_rejected() {
    let result = StashBuilder::<u8>::new()
      .sweep_interval(Duration::ZERO)
      .build();
    assert_eq!(result.err(), Some(BuildError::ZeroSweepInterval));
  }

  #[test]
  fn default_sentinel_means_never_for_the_builder() {
    let stash = StashBuilder::<u8>::new()
      .default_expiration(Expires::Default)
      .build()
      .unwrap();
    assert!(stash.default_expiration().is_never());
  }

  #[test]
  fn configured_values_reach_the_stash() {
    let stash = StashBuilder::<u8>::new()
      .default_expiration(expires().after_seconds(3))
      .sweep_interval(Duration::from_millis(250))
      .build()
      .unwrap();
    assert_eq!(stash.default_expiration().duration(), Some(Duration::from_secs(3)));
    assert_eq!(stash.sweep_interval(), Duration::from_millis(250));
    assert!(!stash.is_sweeping());
  }
}
