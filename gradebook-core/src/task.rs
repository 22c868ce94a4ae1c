//! Background execution for blocking storage operations
//!
//! Each submitted operation runs on its own short-lived worker thread so the
//! caller's primary thread never blocks on storage I/O. The worker reports
//! `Pending -> Running -> {Succeeded | Failed}` over a channel; terminal
//! states are final and nothing is retried automatically.
//!
//! Interactive callers poll the handle from their event loop (and should
//! keep the affected entity read-only while a mutation is in flight - the
//! runner does not arbitrate concurrent mutations against the same entity).
//! Tests and batch callers block on [`TaskHandle::wait`].
//!
//! A worker that dies without reporting (a panic in the job) surfaces as
//! [`Error::Task`]; failures are never swallowed.

use crate::error::{Error, Result};
use crossbeam::channel::{unbounded, Receiver, TryRecvError};
use std::thread;

/// Lifecycle of a submitted operation.
#[derive(Debug)]
pub enum TaskState<T> {
    /// Submitted, worker not yet started
    Pending,
    /// Worker is executing the operation
    Running,
    /// Operation finished with a value
    Succeeded(T),
    /// Operation finished with an error
    Failed(Error),
}

impl<T> TaskState<T> {
    /// Whether this state is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded(_) | TaskState::Failed(_))
    }
}

/// Handle to a submitted operation.
///
/// Observes state transitions as the worker sends them; dropping the handle
/// detaches the worker (the operation still runs to completion).
pub struct TaskHandle<T> {
    rx: Receiver<TaskState<T>>,
    state: TaskState<T>,
}

/// Run a blocking operation on a dedicated worker thread.
///
/// Returns immediately with a handle in the `Pending` state.
pub fn submit<T, F>(job: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = unbounded();

    thread::spawn(move || {
        // The receiver may already be gone; a detached worker still runs.
        let _ = tx.send(TaskState::Running);

        let terminal = match job() {
            Ok(value) => TaskState::Succeeded(value),
            Err(err) => {
                tracing::warn!(error = %err, "Background task failed");
                TaskState::Failed(err)
            }
        };
        let _ = tx.send(terminal);
    });

    TaskHandle {
        rx,
        state: TaskState::Pending,
    }
}

impl<T> TaskHandle<T> {
    /// Drain any delivered transitions without blocking and return the
    /// current state.
    pub fn poll(&mut self) -> &TaskState<T> {
        loop {
            match self.rx.try_recv() {
                Ok(state) => self.state = state,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.state.is_terminal() {
                        self.state = TaskState::Failed(worker_died());
                    }
                    break;
                }
            }
        }
        &self.state
    }

    /// Whether the operation reached a terminal state
    pub fn is_finished(&mut self) -> bool {
        self.poll().is_terminal()
    }

    /// Block until the operation reaches a terminal state and return its
    /// result.
    pub fn wait(mut self) -> Result<T> {
        while !self.state.is_terminal() {
            match self.rx.recv() {
                Ok(state) => self.state = state,
                Err(_) => self.state = TaskState::Failed(worker_died()),
            }
        }

        match self.state {
            TaskState::Succeeded(value) => Ok(value),
            TaskState::Failed(err) => Err(err),
            TaskState::Pending | TaskState::Running => unreachable!("terminal state checked above"),
        }
    }
}

fn worker_died() -> Error {
    Error::Task("worker exited without delivering a result".to_string())
}
