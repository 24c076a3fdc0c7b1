//! Expiration policies describing when a stashed entry becomes stale.
//!
//! An [`Expiration`] is built fluently. Every sub-condition that is set is
//! checked independently and the entry is stale as soon as any one of them
//! holds:
//!
//! ```
//! use fibre_stash::expires;
//!
//! // Stale after 20 idle minutes OR one hour after creation, whichever comes first.
//! let policy = expires().after_minutes_idle(20).after_hours(1);
//! assert!(policy.can_expire());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// A user-supplied predicate that marks an entry stale when it returns `true`.
///
/// It is re-evaluated on every read of the entry and on every sweep tick, so
/// it must be cheap. It must not call back into the stash that owns the entry.
pub type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Describes when an entry expires.
///
/// An empty `Expiration` never expires; see [`Expiration::never`].
#[derive(Clone, Default)]
pub struct Expiration {
  /// Maximum age, measured from the moment the entry was written.
  after: Option<Duration>,
  /// Sliding window, measured from the last read that returned the entry.
  idle: Option<Duration>,
  /// Fixed point in time after which the entry is stale.
  deadline: Option<Instant>,
  condition: Option<Condition>,
}

impl fmt::Debug for Expiration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Expiration")
      .field("after", &self.after)
      .field("idle", &self.idle)
      .field("deadline", &self.deadline)
      .field("has_condition", &self.condition.is_some())
      .finish()
  }
}

/// Creates a new, empty [`Expiration`] ready to be configured.
///
/// Shorthand for [`Expiration::new`].
pub fn expires() -> Expiration {
  Expiration::new()
}

impl Expiration {
  /// Creates an empty policy. Until a sub-condition is set it never expires.
  pub fn new() -> Self {
    Self::default()
  }

  /// The permanent policy: entries written with it are never swept.
  pub fn never() -> Self {
    Self::default()
  }

  // --- Age since creation ---

  /// Expires the entry once `duration` has passed since it was written.
  pub fn after_duration(mut self, duration: Duration) -> Self {
    self.after = Some(duration);
    self
  }

  pub fn after_seconds(self, seconds: u64) -> Self {
    self.after_duration(Duration::from_secs(seconds))
  }

  pub fn after_minutes(self, minutes: u64) -> Self {
    self.after_duration(Duration::from_secs(minutes.saturating_mul(SECS_PER_MINUTE)))
  }

  pub fn after_hours(self, hours: u64) -> Self {
    self.after_duration(Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR)))
  }

  pub fn after_days(self, days: u64) -> Self {
    self.after_duration(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
  }

  // --- Idle (sliding window) ---

  /// Expires the entry if it has not been read for `duration`.
  ///
  /// Every read that returns the entry restarts the window.
  pub fn after_idle_duration(mut self, duration: Duration) -> Self {
    self.idle = Some(duration);
    self
  }

  pub fn after_seconds_idle(self, seconds: u64) -> Self {
    self.after_idle_duration(Duration::from_secs(seconds))
  }

  pub fn after_minutes_idle(self, minutes: u64) -> Self {
    self.after_idle_duration(Duration::from_secs(minutes.saturating_mul(SECS_PER_MINUTE)))
  }

  pub fn after_hours_idle(self, hours: u64) -> Self {
    self.after_idle_duration(Duration::from_secs(hours.saturating_mul(SECS_PER_HOUR)))
  }

  pub fn after_days_idle(self, days: u64) -> Self {
    self.after_idle_duration(Duration::from_secs(days.saturating_mul(SECS_PER_DAY)))
  }

  // --- Absolute deadline ---

  /// Expires the entry once `deadline` has passed.
  pub fn on_instant(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// Expires the entry once the wall-clock `date` has passed.
  ///
  /// The date is converted to a monotonic deadline when this is called, so
  /// later wall-clock adjustments do not move it. A date too far in the
  /// future to be represented can never be reached, so it leaves any
  /// previously set deadline in place.
  pub fn on_date(mut self, date: SystemTime) -> Self {
    let now = Instant::now();
    let converted = match date.duration_since(SystemTime::now()) {
      Ok(remaining) => now.checked_add(remaining),
      Err(past) => Some(now.checked_sub(past.duration()).unwrap_or(now)),
    };
    if let Some(deadline) = converted {
      self.deadline = Some(deadline);
    }
    self
  }

  // --- Custom condition ---

  /// Expires the entry whenever `condition` returns `true`.
  ///
  /// The condition is also checked on every read: an entry whose condition
  /// holds is dropped and treated as a miss, so a get-or-compute call reloads
  /// it immediately.
  pub fn on_condition<F>(mut self, condition: F) -> Self
  where
    F: Fn() -> bool + Send + Sync + 'static,
  {
    self.condition = Some(Arc::new(condition));
    self
  }

  // --- Accessors ---

  pub fn duration(&self) -> Option<Duration> {
    self.after
  }

  pub fn idle(&self) -> Option<Duration> {
    self.idle
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn condition(&self) -> Option<&Condition> {
    self.condition.as_ref()
  }

  // --- Evaluation ---

  /// Returns `true` if any configured sub-condition reports the entry stale.
  ///
  /// All sub-conditions are evaluated; none takes precedence over another.
  pub fn is_expired(&self, now: Instant, created: Instant, last_accessed: Instant) -> bool {
    if let Some(after) = self.after {
      if now.saturating_duration_since(created) > after {
        return true;
      }
    }
    if let Some(idle) = self.idle {
      if now.saturating_duration_since(last_accessed) > idle {
        return true;
      }
    }
    if let Some(deadline) = self.deadline {
      if now > deadline {
        return true;
      }
    }
    self.is_expired_by_condition()
  }

  /// Evaluates only the custom condition, if one is set.
  pub fn is_expired_by_condition(&self) -> bool {
    self.condition.as_ref().is_some_and(|condition| condition())
  }

  /// Returns `true` if an entry with this policy could ever become stale and
  /// therefore has to be tracked by the sweeper.
  pub fn can_expire(&self) -> bool {
    self.after.is_some() || self.idle.is_some() || self.deadline.is_some() || self.condition.is_some()
  }

  /// Returns `true` for the permanent policy.
  pub fn is_never(&self) -> bool {
    !self.can_expire()
  }
}

/// The expiration argument accepted by write operations.
///
/// This is where the two sentinels live: `Default` defers to the stash's
/// configured default policy, `Never` pins the entry permanently. A plain
/// [`Expiration`] converts into `Expires::Policy`.
#[derive(Debug, Clone, Default)]
pub enum Expires {
  /// Use the default policy the stash was built with.
  #[default]
  Default,
  /// Never expire.
  Never,
  /// Expire according to the given policy.
  Policy(Expiration),
}

impl Expires {
  /// Resolves the sentinels into the concrete policy that gets stored.
  pub(crate) fn resolve(self, default: &Expiration) -> Expiration {
    match self {
      Expires::Default => default.clone(),
      Expires::Never => Expiration::never(),
      Expires::Policy(expiration) => expiration,
    }
  }
}

impl From<Expiration> for Expires {
  fn from(expiration: Expiration) -> Self {
    Expires::Policy(expiration)
  }
}
