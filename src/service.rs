use std::fmt;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::config::{ServiceOptions, ServiceOptionsBuilder};
use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::SqlOffloadError;
use crate::executor::Executor;
use crate::library::LibraryGuard;
use crate::types::ClientFlags;

struct ServiceInner<D: Driver> {
    executor: Executor,
    tracker: TaskTracker,
    options: ServiceOptions,
    context: D::Context,
    _library: LibraryGuard<D>,
}

impl<D: Driver> Drop for ServiceInner<D> {
    fn drop(&mut self) {
        // Runs before `_library` drops, so the driver library outlives the worker.
        self.executor.stop_and_join();
    }
}

/// Owns the worker thread shared by every connection created from it.
///
/// All blocking driver calls of those connections run one at a time on that
/// worker. Use several services for parallel database work. Cloning is cheap
/// and shares the same worker.
pub struct Service<D: Driver> {
    inner: Arc<ServiceInner<D>>,
}

impl<D: Driver> Clone for Service<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> Service<D> {
    /// # Errors
    /// See [`Service::with_context`].
    pub fn new() -> Result<Self, SqlOffloadError>
    where
        D::Context: Default,
    {
        Self::with_context(ServiceOptions::default(), D::Context::default())
    }

    /// # Errors
    /// See [`Service::with_context`].
    pub fn with_options(options: ServiceOptions) -> Result<Self, SqlOffloadError>
    where
        D::Context: Default,
    {
        Self::with_context(options, D::Context::default())
    }

    /// Create a service. The driver library is initialized if this is the
    /// first live service for `D`; the worker starts on first use.
    ///
    /// # Errors
    /// [`SqlOffloadError::ConfigError`] for invalid options,
    /// [`SqlOffloadError::ConnectionError`] when the driver library fails to initialize.
    pub fn with_context(options: ServiceOptions, context: D::Context) -> Result<Self, SqlOffloadError> {
        options.validate()?;
        let library = LibraryGuard::<D>::acquire().map_err(SqlOffloadError::ConnectionError)?;
        debug!(worker = %options.worker_name, "service created");
        Ok(Self {
            inner: Arc::new(ServiceInner {
                executor: Executor::new(options.worker_name.clone()),
                tracker: TaskTracker::new(),
                options,
                context,
                _library: library,
            }),
        })
    }

    #[must_use]
    pub fn builder() -> ServiceOptionsBuilder {
        ServiceOptionsBuilder::new()
    }

    /// A new, unopened connection without extra client flags.
    #[must_use]
    pub fn connection(&self) -> Connection<D> {
        self.connection_with_flags(ClientFlags::empty())
    }

    #[must_use]
    pub fn connection_with_flags(&self, flags: ClientFlags) -> Connection<D> {
        Connection::new(self.clone(), flags)
    }

    #[must_use]
    pub fn options(&self) -> &ServiceOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn is_worker_started(&self) -> bool {
        self.inner.executor.is_started()
    }

    /// Id of the worker thread, once started.
    #[must_use]
    pub fn worker_thread_id(&self) -> Option<std::thread::ThreadId> {
        self.inner.executor.worker_thread_id()
    }

    /// Number of operations whose outcome has not been delivered yet.
    #[must_use]
    pub fn outstanding_operations(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Wait until every outstanding operation has been delivered, then stop
    /// the worker after it drains its queue. Later submissions fail with
    /// [`SqlOffloadError::WorkerError`].
    pub async fn shutdown(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        let inner = Arc::clone(&self.inner);
        if tokio::task::spawn_blocking(move || inner.executor.stop_and_join())
            .await
            .is_err()
        {
            warn!(worker = %self.inner.options.worker_name, "worker join task failed");
        }
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }

    pub(crate) fn context(&self) -> &D::Context {
        &self.inner.context
    }
}

impl<D: Driver> fmt::Debug for Service<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("options", &self.inner.options)
            .field("executor", &self.inner.executor)
            .finish_non_exhaustive()
    }
}
