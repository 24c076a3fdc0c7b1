use thiserror::Error;

/// Errors that can occur when building a stash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The sweeper was configured with a zero tick interval, which would spin
  /// a background thread without pause.
  #[error("sweep interval cannot be zero")]
  ZeroSweepInterval,
}
