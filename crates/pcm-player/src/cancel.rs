//! Cooperative cancellation of an in-flight playback.
//!
//! The streaming loop polls [`CancelToken::is_requested`] once per period and between write
//! retries. A [`StopHandle`] raises the flag from any thread and then waits on a condition
//! variable until the loop has exited, or until its timeout runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Result of a stop request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// No playback was running.
    Idle,
    /// The playback that was running has exited.
    Acknowledged,
    /// The wait ran out before the playback exited; it will still stop at its next check.
    TimedOut,
}

#[derive(Debug, Default)]
struct Phase {
    active: bool,
    /// Bumped on every playback start so a waiter never mistakes a new playback for its own.
    generation: u64,
}

#[derive(Debug, Default)]
struct Shared {
    requested: AtomicBool,
    phase: Mutex<Phase>,
    cv: Condvar,
}

impl Shared {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cancellation flag owned by a playback session.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stop was requested for the current playback.
    pub fn is_requested(&self) -> bool {
        self.shared.requested.load(Ordering::Acquire)
    }

    /// Handle for requesting a stop from elsewhere. `timeout` bounds
    /// [`StopHandle::request_stop`]; `None` waits for the acknowledgement.
    pub fn stop_handle(&self, timeout: Option<Duration>) -> StopHandle {
        StopHandle {
            shared: self.shared.clone(),
            timeout,
        }
    }

    /// Mark a playback as running and clear any stale request.
    ///
    /// The returned guard acknowledges (clears the flag and wakes waiters) when dropped.
    pub fn begin(&self) -> ActivePlayback {
        let mut phase = self.shared.phase();
        phase.generation = phase.generation.wrapping_add(1);
        phase.active = true;
        self.shared.requested.store(false, Ordering::Release);
        ActivePlayback {
            token: self.clone(),
        }
    }

    fn acknowledge(&self) {
        let mut phase = self.shared.phase();
        self.shared.requested.store(false, Ordering::Release);
        phase.active = false;
        drop(phase);
        self.shared.cv.notify_all();
    }
}

/// A running playback; see [`CancelToken::begin`].
#[derive(Debug)]
pub struct ActivePlayback {
    token: CancelToken,
}

impl Drop for ActivePlayback {
    fn drop(&mut self) {
        self.token.acknowledge();
    }
}

/// Requests that the running playback stop. Cheap to clone and usable from any thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    shared: Arc<Shared>,
    timeout: Option<Duration>,
}

impl StopHandle {
    /// Ask the running playback to stop and wait, up to the handle's timeout, for it to exit.
    ///
    /// Returns immediately with [`StopOutcome::Idle`] when nothing is playing. Calling it again
    /// while a request is pending just waits again.
    pub fn request_stop(&self) -> StopOutcome {
        self.request(self.timeout)
    }

    /// Like [`request_stop`](Self::request_stop) but waits without a bound.
    pub fn request_stop_and_wait(&self) -> StopOutcome {
        self.request(None)
    }

    /// Whether a playback is currently running.
    pub fn is_active(&self) -> bool {
        self.shared.phase().active
    }

    fn request(&self, timeout: Option<Duration>) -> StopOutcome {
        let phase = self.shared.phase();
        if !phase.active {
            return StopOutcome::Idle;
        }
        let generation = phase.generation;
        self.shared.requested.store(true, Ordering::Release);

        let pending = |p: &mut Phase| p.active && p.generation == generation;
        match timeout {
            Some(timeout) => {
                let (mut phase, _) = self
                    .shared
                    .cv
                    .wait_timeout_while(phase, timeout, pending)
                    .unwrap_or_else(|e| e.into_inner());
                if pending(&mut *phase) {
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "stop not acknowledged in time"
                    );
                    StopOutcome::TimedOut
                } else {
                    StopOutcome::Acknowledged
                }
            }
            None => {
                let _phase = self
                    .shared
                    .cv
                    .wait_while(phase, pending)
                    .unwrap_or_else(|e| e.into_inner());
                StopOutcome::Acknowledged
            }
        }
    }
}
