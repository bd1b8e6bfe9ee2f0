//! Operation handlers: the caller-side half of every asynchronous call.
//!
//! A [`PendingOperation`] is created on the caller's thread when an operation
//! is submitted. It captures the connection's generation, pins the service's
//! task tracker and ships the blocking work to the worker. The outcome travels
//! back over a oneshot channel and is checked against the connection's current
//! generation before anyone sees it.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::warn;

use crate::cancel::GenerationWatch;
use crate::connection::{ConnectionShared, ConnectionState, Status};
use crate::driver::Driver;
use crate::error::SqlOffloadError;
use crate::service::Service;

/// Receives the outcome of an asynchronous operation exactly once.
///
/// Any `FnOnce(Result<T, SqlOffloadError>) + Send + 'static` closure qualifies.
pub trait CompletionHandler<T>: Send + 'static {
    fn complete(self, outcome: Result<T, SqlOffloadError>);
}

impl<T, F> CompletionHandler<T> for F
where
    F: FnOnce(Result<T, SqlOffloadError>) + Send + 'static,
{
    fn complete(self, outcome: Result<T, SqlOffloadError>) {
        self(outcome);
    }
}

/// Clears the connection's in-flight marker when dropped, including when the
/// awaiting future is abandoned.
struct InFlight {
    status: Arc<Status>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.status.end_operation();
    }
}

struct Submitted<T> {
    receiver: oneshot::Receiver<Result<T, SqlOffloadError>>,
    status: Arc<Status>,
    watch: GenerationWatch,
    in_flight: InFlight,
    liveness: TaskTrackerToken,
}

/// An operation queued on the worker. Await it, or hand it a
/// [`CompletionHandler`] with [`PendingOperation::deliver_to`].
#[must_use = "the outcome of a pending operation is only observable by awaiting or delivering it"]
pub struct PendingOperation<T> {
    op: &'static str,
    tracker: TaskTracker,
    submitted: Result<Submitted<T>, SqlOffloadError>,
}

impl<T: Send + 'static> PendingOperation<T> {
    pub(crate) fn submit<D, F>(
        shared: &Arc<ConnectionShared<D>>,
        service: &Service<D>,
        op: &'static str,
        work: F,
    ) -> Self
    where
        D: Driver,
        F: FnOnce(&mut ConnectionState<D>, &GenerationWatch) -> Result<T, SqlOffloadError>
            + Send
            + 'static,
    {
        Self {
            op,
            tracker: service.tracker().clone(),
            submitted: enqueue(shared, service, op, work),
        }
    }

    /// Wait for the worker and return the outcome, or
    /// [`SqlOffloadError::CancellationError`] if the connection was cancelled
    /// or closed in the meantime.
    ///
    /// # Errors
    /// Whatever the operation failed with, or the cancellation above.
    pub async fn finish(self) -> Result<T, SqlOffloadError> {
        let Submitted {
            receiver,
            status,
            watch,
            in_flight,
            liveness,
        } = self.submitted?;

        let received = receiver.await;
        drop(in_flight);

        let outcome = received.unwrap_or_else(|_| {
            Err(SqlOffloadError::WorkerError(format!(
                "worker dropped the {} operation",
                self.op
            )))
        });
        let delivered = if status.is_current(&watch) {
            outcome
        } else {
            warn!(
                op = self.op,
                generation = watch.id(),
                "connection cancelled before delivery; reporting cancellation"
            );
            Err(SqlOffloadError::CancellationError)
        };
        drop(liveness);
        delivered
    }

    /// Deliver the outcome to `handler` from a task on the calling runtime.
    ///
    /// Without a tokio runtime on the current thread the handler is invoked
    /// immediately with a [`SqlOffloadError::UsageError`].
    pub fn deliver_to<H: CompletionHandler<T>>(self, handler: H) {
        match Handle::try_current() {
            Ok(runtime) => {
                let tracker = self.tracker.clone();
                tracker.spawn_on(
                    async move {
                        let outcome = self.finish().await;
                        handler.complete(outcome);
                    },
                    &runtime,
                );
            }
            Err(_) => {
                drop(self);
                handler.complete(Err(SqlOffloadError::usage(
                    "callback delivery requires a tokio runtime on the calling thread",
                )));
            }
        }
    }
}

fn enqueue<D, T, F>(
    shared: &Arc<ConnectionShared<D>>,
    service: &Service<D>,
    op: &'static str,
    work: F,
) -> Result<Submitted<T>, SqlOffloadError>
where
    D: Driver,
    T: Send + 'static,
    F: FnOnce(&mut ConnectionState<D>, &GenerationWatch) -> Result<T, SqlOffloadError>
        + Send
        + 'static,
{
    let status = Arc::clone(shared.status());
    status.begin_operation(op)?;
    let in_flight = InFlight {
        status: Arc::clone(&status),
    };
    let watch = status.watch();
    let liveness = service.tracker().token();

    let (respond_to, receiver) = oneshot::channel();
    let job_shared = Arc::clone(shared);
    let job_watch = watch.clone();
    service.executor().submit(
        op,
        Box::new(move || {
            let outcome = {
                let mut state = job_shared.lock_state();
                work(&mut state, &job_watch)
            };
            let _ = respond_to.send(outcome);
        }),
    )?;

    Ok(Submitted {
        receiver,
        status,
        watch,
        in_flight,
        liveness,
    })
}

impl<T: Send + 'static> IntoFuture for PendingOperation<T> {
    type Output = Result<T, SqlOffloadError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.finish())
    }
}

impl<T> fmt::Debug for PendingOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("op", &self.op)
            .field("submitted", &self.submitted.is_ok())
            .finish()
    }
}
