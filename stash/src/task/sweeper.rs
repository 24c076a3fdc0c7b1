use crate::entry::EntryMeta;
use crate::shared::StashShared;
use crate::task::ticker::Ticker;

use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

const SWEEPER_THREAD_NAME: &str = "fibre-stash-sweeper";

enum SweeperState {
  Stopped,
  Running(Ticker),
}

/// Owns the lifecycle of the background sweep.
///
/// The sweeper starts the first time an entry that can expire is written and
/// parks itself again as soon as a tick finds the expirable index empty, so a
/// stash holding only permanent entries runs no background work at all.
pub(crate) struct Sweeper {
  state: Mutex<SweeperState>,
  interval: Duration,
}

impl Sweeper {
  pub(crate) fn new(interval: Duration) -> Self {
    Self {
      state: Mutex::new(SweeperState::Stopped),
      interval,
    }
  }

  pub(crate) fn interval(&self) -> Duration {
    self.interval
  }

  pub(crate) fn is_running(&self) -> bool {
    matches!(*self.state.lock(), SweeperState::Running(_))
  }

  /// Starts the periodic sweep unless it is already running.
  ///
  /// Must be called after the expirable entry has been published to the
  /// index, see `stop_if_idle`.
  pub(crate) fn start_if_needed<V>(&self, shared: &Arc<StashShared<V>>)
  where
    V: Send + Sync + 'static,
  {
    let mut state = self.state.lock();
    if let SweeperState::Running(_) = *state {
      return;
    }

    // The task only holds a weak reference: once the last stash handle is
    // gone the next tick ends it.
    let weak = Arc::downgrade(shared);
    let started = Ticker::start(SWEEPER_THREAD_NAME, self.interval, move || {
      let Some(shared) = weak.upgrade() else {
        return ControlFlow::Break(());
      };
      // Conditions are user code. A panicking one ends this ticker, and the
      // state must say so or no write could ever restart the sweep.
      match panic::catch_unwind(AssertUnwindSafe(|| sweep(&shared))) {
        Ok(flow) => flow,
        Err(_) => {
          warn!("stash sweep panicked; sweeper stopped until the next expirable write");
          shared.sweeper.mark_stopped();
          ControlFlow::Break(())
        }
      }
    });

    match started {
      Ok(ticker) => {
        debug!(interval = ?self.interval, "stash sweeper started");
        *state = SweeperState::Running(ticker);
      }
      // Stay stopped; the next expirable write retries.
      Err(err) => warn!(error = %err, "failed to spawn stash sweeper thread"),
    }
  }

  /// Moves to `Stopped` unconditionally, dropping the current ticker.
  fn mark_stopped(&self) {
    *self.state.lock() = SweeperState::Stopped;
  }

  /// Moves to `Stopped` if `is_idle` confirms there is nothing left to sweep.
  ///
  /// `is_idle` runs under the state lock. A writer publishes to the index
  /// before it takes that lock in `start_if_needed`, so either we see its
  /// entry here or it sees us stopped and starts a fresh ticker.
  fn stop_if_idle(&self, is_idle: impl FnOnce() -> bool) -> bool {
    let mut state = self.state.lock();
    if !is_idle() {
      return false;
    }
    // Dropping the ticker flags its thread; the current tick returns Break anyway.
    *state = SweeperState::Stopped;
    true
  }
}

/// One sweep tick: evict everything the expirable index reports stale, then
/// park the sweeper if nothing expirable remains.
pub(crate) fn sweep<V>(shared: &StashShared<V>) -> ControlFlow<()> {
  shared.metrics.sweeps.fetch_add(1, Ordering::Relaxed);

  let now = Instant::now();
  let stale: Vec<(String, Arc<EntryMeta>)> = {
    let index = shared.expirable.read();
    index
      .iter()
      .filter(|(_, meta)| meta.is_expired(now))
      .map(|(key, meta)| (key.clone(), meta.clone()))
      .collect()
  };

  if !stale.is_empty() {
    let evicted = shared.evict_stale(&stale);
    shared
      .metrics
      .evicted_by_sweeper
      .fetch_add(evicted, Ordering::Relaxed);
    if evicted > 0 {
      debug!(evicted, "stash sweep evicted expired entries");
    }
  }

  if shared.sweeper.stop_if_idle(|| shared.expirable.is_empty()) {
    debug!("stash sweeper stopped: nothing left to expire");
    return ControlFlow::Break(());
  }
  ControlFlow::Continue(())
}
