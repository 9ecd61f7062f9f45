use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

/// Thread-safe FIFO staging buffer between API callers and the flusher.
///
/// `push` is O(1) and wakes the flusher; `drain` atomically moves the whole
/// queue out so the commit never runs under the queue lock.
pub struct StagingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl<T> Default for StagingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StagingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Append a value; returns the new queue length.
    pub fn push(&self, value: T) -> usize {
        let len = {
            let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            q.push_back(value);
            q.len()
        };
        self.notify.notify_one();
        len
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically move out everything queued so far, in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *q).into()
    }

    /// Wait until a push or shutdown wakes the consumer.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Wake all waiters; the consumer checks [`Self::is_shutdown`] and
    /// drains whatever is left.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
