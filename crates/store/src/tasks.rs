use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;

/// Fire-and-forget background tasks with join-on-shutdown.
///
/// No scheduling guarantees beyond "runs on the ambient runtime". The
/// owning store calls [`TaskRunner::wait`] while closing, or
/// [`TaskRunner::clear`] when it is dropped without a clean close.
#[derive(Default)]
pub struct TaskRunner {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        // Opportunistically drop handles of tasks that already finished.
        handles.retain(|h| !h.is_finished());
        handles.push(tokio::spawn(future));
    }

    /// Await every outstanding task.
    pub async fn wait(&self) {
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!(error = %err, "background task failed");
                }
            }
        }
    }

    /// Abort and forget every outstanding task.
    pub fn clear(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}
