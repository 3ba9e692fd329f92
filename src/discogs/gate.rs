//! Request gate that throttles outbound API calls based on the remaining
//! request quota echoed back on every Discogs response.
//!
//! The gate owns all throttle state. Callers `admit()` before sending a
//! request and `observe_quota()` with the quota header afterwards; when the
//! quota drops to the threshold the gate closes for a fixed delay and queued
//! callers are released in arrival order once it reopens.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Throttle state. Owned exclusively by one `RequestGate`; nothing else
/// reads or mutates it.
struct GateState {
  /// Last-seen remaining quota. `None` means unlimited.
  remaining: Option<u64>,
  throttled: bool,
  /// Parked callers, oldest first.
  waiters: VecDeque<oneshot::Sender<()>>,
}

/// Admission gate for outbound requests.
///
/// Clone shares the same state, so one gate can serve every caller of a
/// client. Independent gates (e.g. one per test) do not interact.
#[derive(Clone)]
pub struct RequestGate {
  state: Arc<Mutex<GateState>>,
  /// Remaining-quota value at or below which the gate closes.
  threshold: u64,
  /// How long the gate stays closed before draining the queue.
  delay: Duration,
}

impl RequestGate {
  pub fn new(threshold: u64, delay: Duration) -> Self {
    Self {
      state: Arc::new(Mutex::new(GateState {
        remaining: None,
        throttled: false,
        waiters: VecDeque::new(),
      })),
      threshold,
      delay,
    }
  }

  /// Wait for admission.
  ///
  /// Returns immediately while the gate is open. While throttled the caller
  /// parks in FIFO order and resumes only when the reopen timer drains the
  /// queue; throttling is visible to callers only as latency.
  pub async fn admit(&self) -> Result<()> {
    let rx = {
      let mut state = self
        .state
        .lock()
        .map_err(|e| eyre!("Gate lock poisoned: {}", e))?;

      if !state.throttled {
        return Ok(());
      }

      let (tx, rx) = oneshot::channel();
      state.waiters.push_back(tx);
      rx
    };

    // The sender is only dropped if the gate itself is dropped; treat that
    // as released rather than failing the request.
    let _ = rx.await;
    Ok(())
  }

  /// Record the remaining-quota value from a response.
  ///
  /// `None` means the server did not report a quota and is treated as
  /// unlimited. At or below the threshold the gate closes and schedules a
  /// reopen after the configured delay. A high value observed while the gate
  /// is closed does not reopen it early; only the timer does.
  pub fn observe_quota(&self, remaining: Option<u64>) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Gate lock poisoned: {}", e))?;

    state.remaining = remaining;

    let low = matches!(remaining, Some(r) if r <= self.threshold);
    if low && !state.throttled {
      state.throttled = true;
      warn!(
        remaining = remaining.unwrap_or(0),
        delay_ms = self.delay.as_millis() as u64,
        "request quota low, throttling"
      );

      let gate = self.clone();
      tokio::spawn(async move {
        tokio::time::sleep(gate.delay).await;
        gate.reopen();
      });
    }

    Ok(())
  }

  /// Reopen the gate and drain the queue oldest-first. Stops early if a
  /// released request re-throttles the gate mid-drain.
  fn reopen(&self) {
    {
      let Ok(mut state) = self.state.lock() else {
        return;
      };
      state.throttled = false;
      debug!(
        queued = state.waiters.len(),
        "throttle window elapsed, releasing queued requests"
      );
    }

    loop {
      let next = {
        let Ok(mut state) = self.state.lock() else {
          return;
        };
        if state.throttled {
          break;
        }
        state.waiters.pop_front()
      };

      match next {
        Some(tx) => {
          let _ = tx.send(());
        }
        None => break,
      }
    }
  }

  /// Last-seen remaining quota, `None` if the server never reported one.
  #[allow(dead_code)]
  pub fn remaining(&self) -> Option<u64> {
    self.state.lock().ok().and_then(|s| s.remaining)
  }
}
