//! Bounded queue of interleaved `f32` samples.
//!
//! Carries audio between stages of the cpal device:
//! - `writei` → queue (blocking while full)
//! - resampler thread → queue, when one is running
//! - cpal callback drains the queue without blocking
//!
//! `close()` marks the producer side finished; consumers drain what is left and then see the
//! end of the stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// How often blocked producers and drain waiters re-check their abort flag.
const ABORT_POLL: Duration = Duration::from_millis(50);

/// Thread-safe bounded queue for interleaved `f32` samples.
///
/// A single [`Condvar`] signals every state change. The `done` flag lives under the same mutex
/// as the samples so a close can never slip between a check and a wait.
pub(crate) struct SharedAudio {
    channels: usize,
    inner: Mutex<SharedInner>,
    cv: Condvar,
    max_buffered_samples: usize,
}

struct SharedInner {
    queue: VecDeque<f32>,
    done: bool,
}

/// Strategy for popping interleaved frames from the queue.
pub(crate) enum PopStrategy {
    /// Block until exactly `frames` are available, or return `None` if closed before enough data.
    BlockingExact { frames: usize },
    /// Block until at least one frame is available, then return up to `max_frames`.
    BlockingUpTo { max_frames: usize },
    /// Return immediately with up to `max_frames`, or `None` if currently empty.
    NonBlocking { max_frames: usize },
}

impl SharedAudio {
    /// Queue holding at most `max_frames` frames of `channels` samples each.
    pub(crate) fn new(channels: usize, max_frames: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            inner: Mutex::new(SharedInner {
                queue: VecDeque::new(),
                done: false,
            }),
            cv: Condvar::new(),
            max_buffered_samples: max_frames.max(1) * channels,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    /// Buffered frames right now.
    pub(crate) fn len_frames(&self) -> usize {
        self.lock().queue.len() / self.channels
    }

    /// Whether the producer side has closed. Buffered samples may remain.
    pub(crate) fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Mark the queue finished and wake all waiters. Idempotent.
    pub(crate) fn close(&self) {
        let mut g = self.lock();
        g.done = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push as many samples as fit right now, without blocking. Returns how many were taken.
    pub(crate) fn push_available(&self, samples: &[f32]) -> usize {
        let mut g = self.lock();
        if g.done {
            return 0;
        }
        let room = self.max_buffered_samples.saturating_sub(g.queue.len());
        let take = room.min(samples.len());
        g.queue.extend(&samples[..take]);
        drop(g);
        if take > 0 {
            self.cv.notify_all();
        }
        take
    }

    /// Push samples, blocking while the queue is full.
    ///
    /// Returns early when the queue is closed or `abort` becomes true while waiting. Returns the
    /// number of samples pushed.
    pub(crate) fn push_interleaved_blocking(&self, samples: &[f32], abort: &AtomicBool) -> usize {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.lock();

            while g.queue.len() >= self.max_buffered_samples && !g.done {
                if abort.load(Ordering::Acquire) {
                    return offset;
                }
                g = self
                    .cv
                    .wait_timeout(g, ABORT_POLL)
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
            }
            if g.done {
                return offset;
            }

            let take = (self.max_buffered_samples - g.queue.len()).min(samples.len() - offset);
            g.queue.extend(&samples[offset..offset + take]);
            offset += take;

            drop(g);
            self.cv.notify_all();
        }
        offset
    }

    /// Pop interleaved frames using the requested strategy.
    ///
    /// Returns `None` when the queue is closed and no data can satisfy the request.
    pub(crate) fn pop(&self, strategy: PopStrategy) -> Option<Vec<f32>> {
        let mut g = self.lock();
        let take_samples = match strategy {
            PopStrategy::BlockingExact { frames } => {
                let want = frames * self.channels;
                while g.queue.len() < want && !g.done {
                    g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
                }
                if g.queue.len() < want {
                    return None;
                }
                want
            }
            PopStrategy::BlockingUpTo { max_frames } => {
                while g.queue.is_empty() && !g.done {
                    g = self.cv.wait(g).unwrap_or_else(|e| e.into_inner());
                }
                let available_frames = g.queue.len() / self.channels;
                available_frames.min(max_frames) * self.channels
            }
            PopStrategy::NonBlocking { max_frames } => {
                let available_frames = g.queue.len() / self.channels;
                available_frames.min(max_frames) * self.channels
            }
        };

        if take_samples == 0 {
            return None;
        }
        let out: Vec<f32> = g.queue.drain(..take_samples).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }
}

/// Block until `q` is closed and empty, or `abort` becomes true.
///
/// Returns `true` if the queue drained normally.
pub(crate) fn wait_until_done_and_empty_or_abort(q: &SharedAudio, abort: &AtomicBool) -> bool {
    let mut g = q.lock();
    loop {
        if abort.load(Ordering::Acquire) {
            return false;
        }
        if g.done && g.queue.is_empty() {
            return true;
        }
        g = q
            .cv
            .wait_timeout(g, ABORT_POLL)
            .unwrap_or_else(|e| e.into_inner())
            .0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn pop_nonblocking_empty() {
        let q = SharedAudio::new(2, 8);
        assert!(q.pop(PopStrategy::NonBlocking { max_frames: 4 }).is_none());
    }

    #[test]
    fn pop_nonblocking_returns_available_frames() {
        let q = SharedAudio::new(2, 32);
        q.push_available(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let out = q.pop(PopStrategy::NonBlocking { max_frames: 2 }).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len_frames(), 1);
    }

    #[test]
    fn push_available_stops_at_capacity() {
        let q = SharedAudio::new(2, 2);
        assert_eq!(q.push_available(&[0.0; 6]), 4);
        assert_eq!(q.push_available(&[0.0; 2]), 0);
        q.close();
        q.pop(PopStrategy::NonBlocking { max_frames: 8 });
        assert_eq!(q.push_available(&[0.0; 2]), 0);
    }

    #[test]
    fn pop_blocking_exact_waits_for_full_frames() {
        let q = Arc::new(SharedAudio::new(2, 32));
        let q_pop = q.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();

        let handle = thread::spawn(move || {
            start.wait();
            let out = q_pop.pop(PopStrategy::BlockingExact { frames: 3 }).unwrap();
            assert_eq!(out.len(), 6);
        });

        barrier.wait();
        let never = AtomicBool::new(false);
        q.push_interleaved_blocking(&[0.1, 0.2, 0.3, 0.4], &never);
        q.push_interleaved_blocking(&[0.5, 0.6], &never);

        handle.join().unwrap();
    }

    #[test]
    fn pop_blocking_up_to_drains_tail_and_respects_close() {
        let q = Arc::new(SharedAudio::new(2, 32));
        let q_pop = q.clone();
        let barrier = Arc::new(Barrier::new(2));
        let start = barrier.clone();

        let handle = thread::spawn(move || {
            start.wait();
            let out = q_pop.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).unwrap();
            assert_eq!(out.len(), 4);
            assert!(q_pop.pop(PopStrategy::BlockingUpTo { max_frames: 8 }).is_none());
        });

        barrier.wait();
        q.push_available(&[1.0, 2.0, 3.0, 4.0]);
        q.close();

        handle.join().unwrap();
    }

    #[test]
    fn pop_blocking_exact_returns_none_when_closed() {
        let q = SharedAudio::new(2, 32);
        q.close();
        assert!(q.pop(PopStrategy::BlockingExact { frames: 1 }).is_none());
    }

    #[test]
    fn blocked_push_resumes_when_consumer_pops() {
        let q = Arc::new(SharedAudio::new(1, 4));
        let q_push = q.clone();
        let handle = thread::spawn(move || {
            q_push.push_interleaved_blocking(&[1.0; 10], &AtomicBool::new(false))
        });

        let mut got = 0;
        while got < 10 {
            if let Some(v) = q.pop(PopStrategy::BlockingUpTo { max_frames: 3 }) {
                got += v.len();
            }
        }
        assert_eq!(handle.join().unwrap(), 10);
    }

    #[test]
    fn blocked_push_gives_up_on_abort_and_close() {
        let q = SharedAudio::new(1, 2);
        let abort = AtomicBool::new(true);
        assert_eq!(q.push_interleaved_blocking(&[1.0; 5], &abort), 2);

        let q = Arc::new(SharedAudio::new(1, 2));
        let q_push = q.clone();
        let handle = thread::spawn(move || {
            q_push.push_interleaved_blocking(&[1.0; 5], &AtomicBool::new(false))
        });
        while q.len_frames() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        q.close();
        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn wait_until_done_and_empty_returns_when_drained() {
        let q = Arc::new(SharedAudio::new(2, 32));
        q.push_available(&[1.0, 2.0]);
        q.close();
        let q_pop = q.clone();
        let handle = thread::spawn(move || q_pop.pop(PopStrategy::BlockingUpTo { max_frames: 8 }));

        assert!(wait_until_done_and_empty_or_abort(&q, &AtomicBool::new(false)));
        assert!(handle.join().unwrap().is_some());
        assert!(q.is_done());
    }

    #[test]
    fn wait_until_done_and_empty_respects_abort() {
        let q = SharedAudio::new(2, 32);
        let abort = AtomicBool::new(true);
        assert!(!wait_until_done_and_empty_or_abort(&q, &abort));
    }
}
