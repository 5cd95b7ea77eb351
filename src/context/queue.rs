//! Serial execution queues.
//!
//! A `SerialQueue` owns a piece of state on a dedicated thread and runs
//! submitted jobs against it one at a time, in submission order. The state
//! never leaves that thread, so it needs no lock.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// A queue-confined owner of `S`.
pub struct SerialQueue<S> {
    label: String,
    sender: Mutex<Option<Sender<Job<S>>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Start the queue thread, moving `state` onto it.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn(label: &str, mut state: S) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job<S>>();
        let thread_label = label.to_string();
        let handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                trace!(queue = %thread_label, "Queue started");
                while let Ok(job) = receiver.recv() {
                    job(&mut state);
                }
                trace!(queue = %thread_label, "Queue drained");
            })?;

        Ok(Self {
            label: label.to_string(),
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the caller is running on this queue's thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Enqueue a job and return immediately.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the queue has been shut down.
    pub fn dispatch<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or_else(|| self.closed())?;
        sender.send(Box::new(job)).map_err(|_| self.closed())
    }

    /// Enqueue a job and block until it has run, returning its result.
    ///
    /// # Errors
    ///
    /// Returns `ReentrantPerform` when called from the queue's own thread
    /// (it would wait on itself), and `Closed` if the queue shut down
    /// before the job ran.
    pub fn dispatch_and_wait<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(Error::ReentrantPerform {
                queue: self.label.clone(),
            });
        }

        let (done_tx, done_rx) = channel::bounded(1);
        self.dispatch(move |state| {
            let _ = done_tx.send(job(state));
        })?;
        done_rx.recv().map_err(|_| self.closed())
    }

    /// Stop accepting jobs, let queued jobs finish, and join the thread.
    ///
    /// Safe to call more than once. From the queue's own thread the join
    /// is skipped; the thread exits after the current job.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if self.is_current() {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                debug!(queue = %self.label, "Queue thread panicked");
            }
        }
    }

    fn closed(&self) -> Error {
        Error::Closed {
            queue: self.label.clone(),
        }
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        drop(self.sender.get_mut().take());
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.handle.get_mut().take() {
            let _ = handle.join();
        }
    }
}

impl<S> std::fmt::Debug for SerialQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order() {
        let queue = SerialQueue::spawn("test-order", Vec::<u32>::new()).unwrap();
        for i in 0..10 {
            queue.dispatch(move |v| v.push(i)).unwrap();
        }
        let seen = queue.dispatch_and_wait(|v| v.clone()).unwrap();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_runs_on_named_thread() {
        let queue = SerialQueue::spawn("test-named", ()).unwrap();
        let name = queue
            .dispatch_and_wait(|()| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-named"));
    }

    #[test]
    fn test_reentrant_wait_is_rejected() {
        let queue = std::sync::Arc::new(SerialQueue::spawn("test-reentrant", 0u32).unwrap());
        let inner = queue.clone();
        let (tx, rx) = channel::bounded(1);
        queue
            .dispatch(move |_| {
                let result = inner.dispatch_and_wait(|n| *n);
                let _ = tx.send(matches!(result, Err(Error::ReentrantPerform { .. })));
                drop(inner);
            })
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_dispatch_after_shutdown() {
        let queue = SerialQueue::spawn("test-shutdown", 0u32).unwrap();
        queue.dispatch(|n| *n += 1).unwrap();
        queue.shutdown();
        queue.shutdown();
        let err = queue.dispatch(|n| *n += 1).unwrap_err();
        assert!(matches!(err, Error::Closed { .. }));
    }
}
