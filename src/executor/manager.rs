use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, warn};

use crate::error::SqlOffloadError;

use super::channel::{Command, Job};
use super::dispatcher::run_worker;

struct WorkerHandle {
    sender: Sender<Command>,
    thread: JoinHandle<()>,
}

enum WorkerSlot {
    Idle,
    Running(WorkerHandle),
    Stopped,
}

/// Lazily started, service-wide worker. Jobs run one at a time in submission order.
pub(crate) struct Executor {
    worker_name: String,
    slot: Mutex<WorkerSlot>,
}

impl Executor {
    pub(crate) fn new(worker_name: String) -> Self {
        Self {
            worker_name,
            slot: Mutex::new(WorkerSlot::Idle),
        }
    }

    fn slot(&self) -> MutexGuard<'_, WorkerSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue `job` on the worker, starting the worker on first use.
    pub(crate) fn submit(&self, label: &'static str, job: Job) -> Result<(), SqlOffloadError> {
        let mut slot = self.slot();
        if matches!(*slot, WorkerSlot::Idle) {
            *slot = WorkerSlot::Running(self.spawn()?);
        }
        match &*slot {
            WorkerSlot::Running(worker) => worker
                .sender
                .send(Command::Run { label, job })
                .map_err(|_| worker_error("worker thread exited")),
            WorkerSlot::Stopped => Err(worker_error("service has been shut down")),
            WorkerSlot::Idle => Err(worker_error("worker failed to start")),
        }
    }

    fn spawn(&self) -> Result<WorkerHandle, SqlOffloadError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let thread = thread::Builder::new()
            .name(self.worker_name.clone())
            .spawn(move || run_worker(&receiver))
            .map_err(|err| worker_error(&format!("failed to spawn worker thread: {err}")))?;
        debug!(worker = %self.worker_name, "worker started");
        Ok(WorkerHandle { sender, thread })
    }

    pub(crate) fn is_started(&self) -> bool {
        matches!(*self.slot(), WorkerSlot::Running(_))
    }

    pub(crate) fn worker_thread_id(&self) -> Option<ThreadId> {
        match &*self.slot() {
            WorkerSlot::Running(worker) => Some(worker.thread.thread().id()),
            _ => None,
        }
    }

    /// Stop accepting work and queue the shutdown behind everything already submitted.
    /// Returns the thread to join, if one was running.
    pub(crate) fn stop(&self) -> Option<JoinHandle<()>> {
        let previous = std::mem::replace(&mut *self.slot(), WorkerSlot::Stopped);
        match previous {
            WorkerSlot::Running(worker) => {
                let _ = worker.sender.send(Command::Shutdown);
                Some(worker.thread)
            }
            WorkerSlot::Idle | WorkerSlot::Stopped => None,
        }
    }

    /// [`Executor::stop`] and wait for the queue to drain.
    pub(crate) fn stop_and_join(&self) {
        let Some(thread) = self.stop() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            // Last reference dropped by a job on the worker itself; it exits after this job.
            return;
        }
        if thread.join().is_err() {
            warn!(worker = %self.worker_name, "worker thread panicked during shutdown");
        } else {
            debug!(worker = %self.worker_name, "worker stopped");
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("worker_name", &self.worker_name)
            .field("started", &self.is_started())
            .finish()
    }
}

fn worker_error(message: &str) -> SqlOffloadError {
    SqlOffloadError::WorkerError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn worker_starts_lazily_and_runs_jobs_in_order() {
        let executor = Executor::new("executor-test".into());
        assert!(!executor.is_started());

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            executor
                .submit(
                    "push",
                    Box::new(move || {
                        thread::sleep(Duration::from_millis(2));
                        order.lock().unwrap().push(i);
                    }),
                )
                .unwrap();
        }
        assert!(executor.is_started());
        executor.stop_and_join();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn all_jobs_share_one_thread() {
        let executor = Executor::new("executor-thread".into());
        let ids = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..3 {
            let ids = Arc::clone(&ids);
            executor
                .submit(
                    "record",
                    Box::new(move || ids.lock().unwrap().push(thread::current().id())),
                )
                .unwrap();
        }
        let worker = executor.worker_thread_id().unwrap();
        executor.stop_and_join();
        let ids = ids.lock().unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == worker));
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let executor = Executor::new("executor-panic".into());
        let ran = Arc::new(AtomicUsize::new(0));
        executor
            .submit("boom", Box::new(|| panic!("job failure")))
            .unwrap();
        let counter = Arc::clone(&ran);
        executor
            .submit(
                "after",
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        executor.stop_and_join();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn submit_after_stop_fails() {
        let executor = Executor::new("executor-stopped".into());
        executor.stop_and_join();
        let err = executor.submit("late", Box::new(|| {})).unwrap_err();
        assert!(matches!(err, SqlOffloadError::WorkerError(_)));
    }
}
