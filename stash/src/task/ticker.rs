use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// A periodic task running on its own thread.
///
/// The callback runs once per interval until it returns
/// `ControlFlow::Break`, or until the ticker is stopped. Dropping the
/// `Ticker` stops it. Stopping never joins the thread, so a callback may
/// stop (or drop) its own ticker.
#[derive(Debug)]
pub(crate) struct Ticker {
  stop_flag: Arc<AtomicBool>,
  thread: Thread,
}

impl Ticker {
  /// Spawns a named thread that calls `on_tick` every `interval`.
  ///
  /// The first tick happens one full interval after the start. An interval
  /// too large to add to the clock never comes due: the thread just waits to
  /// be stopped.
  pub(crate) fn start<F>(name: &str, interval: Duration, mut on_tick: F) -> io::Result<Self>
  where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
  {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
      let mut next_tick = Instant::now().checked_add(interval);
      loop {
        // Park until the next tick is due, waking early only to stop.
        loop {
          if stop_clone.load(Ordering::Acquire) {
            return;
          }
          let Some(due) = next_tick else {
            thread::park();
            continue;
          };
          let now = Instant::now();
          if now >= due {
            break;
          }
          thread::park_timeout(due - now);
        }

        let tick_start = Instant::now();
        if on_tick().is_break() {
          return;
        }
        next_tick = tick_start.checked_add(interval);
      }
    })?;

    Ok(Self {
      stop_flag,
      thread: handle.thread().clone(),
    })
  }

  /// Signals the thread to exit before its next tick.
  pub(crate) fn stop(&self) {
    self.stop_flag.store(true, Ordering::Release);
    self.thread.unpark();
  }
}

impl Drop for Ticker {
  fn drop(&mut self) {
    self.stop();
  }
}
