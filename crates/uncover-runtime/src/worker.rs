//! Background Worker
//!
//! One OS thread driving a current-thread tokio runtime. Blocking callers
//! hand it jobs and wait for the result; jobs run one at a time, in
//! submission order.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tokio::sync::mpsc;
use uncover_core::{ClientError, Result};

type Job = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()> + Send>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dedicated async worker thread
pub struct Worker {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Start the thread and its runtime
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            runtime.block_on(async move {
                while let Some(job) = receiver.recv().await {
                    job().await;
                }
            });
            tracing::debug!(worker = %thread_name, "Worker drained");
        })?;

        tracing::debug!(worker = %name, "Worker started");
        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Run `task` on the worker and block until it finishes
    ///
    /// Returns [`ClientError::WorkerStopped`] if the worker was shut down or
    /// the task panicked.
    pub fn run<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = std::sync::mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            async move {
                // Caller may be gone; nothing to do then
                let _ = reply_tx.send(task().await);
            }
            .boxed_local()
        });

        locked(&self.sender)
            .as_ref()
            .ok_or(ClientError::WorkerStopped)?
            .send(job)
            .map_err(|_| ClientError::WorkerStopped)?;

        reply_rx.recv().map_err(|_| ClientError::WorkerStopped)
    }

    /// Whether new jobs are still accepted
    pub fn is_running(&self) -> bool {
        locked(&self.sender).is_some()
    }

    /// Stop accepting jobs, let queued ones finish, and join the thread
    pub fn shutdown(&self) {
        locked(&self.sender).take();

        let Some(handle) = locked(&self.thread).take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(worker = %self.name, "Worker thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
