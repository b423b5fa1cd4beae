//! The bounded FIFO between intake and the worker pool.
//!
//! Producers never block: `try_push` fails immediately when the queue is
//! at capacity or closed. Consumers block on `pop` until an item arrives
//! or the queue is closed and drained. The buffer can be rebuilt at a
//! new capacity under a single lock acquisition without losing items.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub(crate) struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    // Signaled when an item arrives or the queue closes.
    items: Condvar,
    // Signaled when the buffer empties.
    drained: Condvar,
}

struct QueueState<T> {
    buf: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        BoundedQueue {
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            items: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert without blocking. Returns the item back when the queue is
    /// full or closed.
    pub(crate) fn try_push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed || state.buf.len() >= state.capacity {
            return Err(item);
        }
        state.buf.push_back(item);
        drop(state);
        self.items.notify_one();
        Ok(())
    }

    /// Remove the oldest item, blocking while the queue is open and
    /// empty. Returns `None` once the queue is closed and drained.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.buf.pop_front() {
                if state.buf.is_empty() {
                    self.drained.notify_all();
                }
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .items
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Refuse further pushes and wake every blocked consumer.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.items.notify_all();
        self.drained.notify_all();
    }

    /// Rebuild the buffer at a new capacity, preserving FIFO order. The
    /// buffer may transiently hold more items than the new capacity; the
    /// excess drains normally while new pushes are refused.
    pub(crate) fn resize(&self, new_capacity: usize) {
        let mut state = self.lock();
        let mut rebuilt = VecDeque::with_capacity(new_capacity);
        rebuilt.extend(state.buf.drain(..));
        state.buf = rebuilt;
        state.capacity = new_capacity;
    }

    /// Wait until the buffer is empty, up to `timeout`. Returns whether
    /// it drained in time.
    pub(crate) fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !state.buf.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .drained
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }

    /// Discard every queued item, returning how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.buf.len();
        state.buf.clear();
        drop(state);
        self.drained.notify_all();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().buf.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
