//! Bounded FIFO of ready audio windows with drop-oldest overflow, so a
//! worker that falls behind never blocks the inbound RTP callback.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

pub struct WorkQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Vec<i16>>>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
        }
    }

    /// Enqueues a window, dropping the oldest queued window if already at
    /// capacity.
    pub fn push(&self, window: Vec<i16>) {
        {
            let mut inner = self.inner.lock();
            if inner.len() >= self.capacity {
                inner.pop_front();
            }
            inner.push_back(window);
        }
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<Vec<i16>> {
        self.inner.lock().pop_front()
    }

    /// Waits up to `timeout` for a window; returns `None` on timeout so the
    /// caller can recheck its running flag.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Vec<i16>> {
        if let Some(w) = self.try_pop() {
            return Some(w);
        }
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => self.try_pop(),
            _ = tokio::time::sleep(timeout) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) {
        self.inner.lock().clear();
    }
}
