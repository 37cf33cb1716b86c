//! Producer/consumer sample queue with a {Ready, Closed} signal set
//!
//! Producers (capture callbacks) only append and notify; they never wait on
//! the consumer. The single consumer blocks in [`SampleQueue::wait_next`]
//! until a sample is queued or the queue is closed.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

struct State<T> {
    samples: VecDeque<T>,
    /// Level signal: set on enqueue, reset when a waiter finds the queue empty
    ready: bool,
    /// Monotonic: once set it is never cleared
    closed: bool,
}

/// Unbounded FIFO of captured samples
pub struct SampleQueue<T> {
    name: &'static str,
    state: Mutex<State<T>>,
    signal: Condvar,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
}

impl<T> SampleQueue<T> {
    /// Create an empty, open queue. `name` is only used in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State {
                samples: VecDeque::new(),
                ready: false,
                closed: false,
            }),
            signal: Condvar::new(),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append a sample and raise Ready.
    ///
    /// Samples enqueued after close are kept but nobody is obliged to read them.
    pub fn enqueue(&self, sample: T) {
        {
            let mut state = self.state.lock();
            state.samples.push_back(sample);
            state.ready = true;
        }
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.signal.notify_all();
    }

    /// Next sample, blocking while the queue is empty and open.
    ///
    /// Returns `None` (the shutdown sentinel) once the queue is closed and
    /// drained. Samples queued before close are still handed out first.
    pub fn wait_next(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(sample) = state.samples.pop_front() {
                self.dequeued.fetch_add(1, Ordering::Relaxed);
                return Some(sample);
            }
            if state.closed {
                trace!("{} queue closed and drained", self.name);
                return None;
            }
            state.ready = false;
            self.signal.wait(&mut state);
        }
    }

    /// Pop without blocking
    pub fn try_next(&self) -> Option<T> {
        let sample = self.state.lock().samples.pop_front();
        if sample.is_some() {
            self.dequeued.fetch_add(1, Ordering::Relaxed);
        }
        sample
    }

    /// Set Closed and wake every waiter. Idempotent.
    pub fn signal_closed(&self) {
        self.state.lock().closed = true;
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discard everything still queued, returning how many samples were dropped
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.samples.len();
        state.samples.clear();
        state.ready = false;
        dropped
    }

    /// Total samples ever enqueued
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total samples handed to the consumer
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for SampleQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
