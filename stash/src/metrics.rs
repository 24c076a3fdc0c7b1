use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the stash.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Producers ---
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,

  // --- Writes ---
  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,

  // --- Expiration ---
  pub(crate) evicted_by_condition: CachePadded<AtomicU64>,
  pub(crate) evicted_by_sweeper: CachePadded<AtomicU64>,
  pub(crate) sweeps: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loads: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      evicted_by_condition: CachePadded::new(AtomicU64::new(0)),
      evicted_by_sweeper: CachePadded::new(AtomicU64::new(0)),
      sweeps: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      loads: self.loads.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      inserts: self.inserts.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      evicted_by_condition: self.evicted_by_condition.load(Ordering::Relaxed),
      evicted_by_sweeper: self.evicted_by_sweeper.load(Ordering::Relaxed),
      sweeps: self.sweeps.load(Ordering::Relaxed),
      uptime: self.created_at.elapsed(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the stash's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Reads that returned a stored value.
  pub hits: u64,
  /// Reads that found nothing usable under the key.
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Producer invocations.
  pub loads: u64,
  /// Producer invocations that returned an error.
  pub load_failures: u64,
  /// Entries written, by `set` or by a successful producer.
  pub inserts: u64,
  /// Entries removed with `remove`.
  pub removals: u64,
  /// Entries dropped on read because their condition reported them stale.
  pub evicted_by_condition: u64,
  /// Entries evicted by the background sweeper.
  pub evicted_by_sweeper: u64,
  /// Sweeper ticks run so far.
  pub sweeps: u64,
  /// Time since the stash was built.
  pub uptime: Duration,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loads", &self.loads)
      .field("load_failures", &self.load_failures)
      .field("inserts", &self.inserts)
      .field("removals", &self.removals)
      .field("evicted_by_condition", &self.evicted_by_condition)
      .field("evicted_by_sweeper", &self.evicted_by_sweeper)
      .field("sweeps", &self.sweeps)
      .field("uptime", &self.uptime)
      .finish()
  }
}
