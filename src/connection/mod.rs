mod ops;
mod state;
mod status;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::debug;

use crate::driver::Driver;
use crate::endpoint::Endpoint;
use crate::error::SqlOffloadError;
use crate::results::ResultSet;
use crate::service::Service;
use crate::types::{AuthInfo, ClientFlags, ConnectOption, ConnectionPhase};

pub(crate) use state::ConnectionState;
pub(crate) use status::Status;

/// State shared between a [`Connection`] and the worker jobs it submits.
pub(crate) struct ConnectionShared<D: Driver> {
    status: Arc<Status>,
    state: Mutex<ConnectionState<D>>,
}

impl<D: Driver> ConnectionShared<D> {
    pub(crate) fn status(&self) -> &Arc<Status> {
        &self.status
    }

    /// Lock the native state, first finishing a close that could not run
    /// while someone else held the lock.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ConnectionState<D>> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.settle(&mut state);
        state
    }

    fn settle(&self, state: &mut ConnectionState<D>) {
        if self.status.take_pending_close() {
            state.release_native();
        }
    }
}

/// A logical database connection.
///
/// Synchronous methods run the driver call on the calling thread.
/// The `*_async` methods and their `async_*` callback twins run it on the
/// service's worker thread and never block the caller.
///
/// At most one asynchronous operation may be outstanding per connection;
/// submitting another one, or calling a synchronous method meanwhile, fails
/// with [`SqlOffloadError::UsageError`]. [`Connection::cancel`] and
/// [`Connection::close`] are always allowed.
pub struct Connection<D: Driver> {
    shared: Arc<ConnectionShared<D>>,
    service: Service<D>,
    flags: ClientFlags,
}

impl<D: Driver> Connection<D> {
    pub(crate) fn new(service: Service<D>, flags: ClientFlags) -> Self {
        let status = Arc::new(Status::new());
        let state = ConnectionState::new(Arc::clone(&status), service.context().clone(), flags);
        Self {
            shared: Arc::new(ConnectionShared {
                status,
                state: Mutex::new(state),
            }),
            service,
            flags,
        }
    }

    fn status(&self) -> &Status {
        &self.shared.status
    }

    fn sync<T>(
        &self,
        op: &str,
        work: impl FnOnce(&mut ConnectionState<D>) -> Result<T, SqlOffloadError>,
    ) -> Result<T, SqlOffloadError> {
        self.status().ensure_idle(op)?;
        let mut state = self.shared.lock_state();
        work(&mut state)
    }

    #[must_use]
    pub fn service(&self) -> &Service<D> {
        &self.service
    }

    #[must_use]
    pub fn state(&self) -> ConnectionPhase {
        self.status().phase()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() != ConnectionPhase::Closed
    }

    /// Whether an asynchronous operation is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.status().is_in_flight()
    }

    /// Allocate the native connection handle.
    ///
    /// # Errors
    /// [`SqlOffloadError::ConnectionError`] when the driver cannot allocate a
    /// handle, [`SqlOffloadError::UsageError`] when already open.
    pub fn open(&self) -> Result<(), SqlOffloadError> {
        self.sync("open", ConnectionState::open)
    }

    /// # Errors
    /// [`SqlOffloadError::ConfigError`] for options the driver does not support.
    pub fn set_option(&self, option: &ConnectOption) -> Result<(), SqlOffloadError> {
        self.sync("set_option", |state| state.set_option(option))
    }

    /// Connect the opened handle.
    ///
    /// # Errors
    /// [`SqlOffloadError::ConnectionError`] with the driver's code and message.
    pub fn connect<E: Endpoint>(
        &self,
        endpoint: &E,
        auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> Result<(), SqlOffloadError> {
        self.sync("connect", |state| state.connect(endpoint, auth, database, flags))
    }

    /// Send one statement.
    ///
    /// # Errors
    /// [`SqlOffloadError::ProtocolError`] when the statement fails,
    /// [`SqlOffloadError::UsageError`] when the connection is not connected.
    pub fn query(&self, statement: &str) -> Result<(), SqlOffloadError> {
        self.sync("query", |state| state.query(statement))
    }

    /// Whether a multi-statement query still has results to store.
    #[must_use]
    pub fn has_more_results(&self) -> bool {
        if self.status().is_in_flight() {
            return false;
        }
        self.shared.lock_state().has_more_results()
    }

    /// Store the pending result. Every result set obtained earlier from this
    /// connection expires.
    ///
    /// # Errors
    /// [`SqlOffloadError::ProtocolError`] when the driver fails to deliver the result.
    pub fn store_result(&self) -> Result<ResultSet, SqlOffloadError> {
        let watch = self.status().watch();
        self.sync("store_result", |state| state.store_result(&watch))
    }

    /// # Errors
    /// [`SqlOffloadError::ProtocolError`] when the driver rejects the mode change.
    pub fn autocommit(&self, mode: bool) -> Result<(), SqlOffloadError> {
        self.sync("autocommit", |state| state.autocommit(mode))
    }

    /// # Errors
    /// [`SqlOffloadError::ProtocolError`] when the commit fails.
    pub fn commit(&self) -> Result<(), SqlOffloadError> {
        self.sync("commit", ConnectionState::commit)
    }

    /// # Errors
    /// [`SqlOffloadError::ProtocolError`] when the rollback fails.
    pub fn rollback(&self) -> Result<(), SqlOffloadError> {
        self.sync("rollback", ConnectionState::rollback)
    }

    /// Rows changed by the most recent statement.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.status().affected_rows()
    }

    /// The driver's last error text, empty when closed or busy.
    #[must_use]
    pub fn error_message(&self) -> String {
        if self.status().is_in_flight() {
            return String::new();
        }
        self.shared.lock_state().error_message()
    }

    /// Flags given at construction.
    #[must_use]
    pub fn flags(&self) -> ClientFlags {
        self.flags
    }

    /// Run `func` against the native handle on the calling thread.
    ///
    /// # Errors
    /// [`SqlOffloadError::UsageError`] when the connection is not open or busy.
    pub fn with_native<R>(&self, func: impl FnOnce(&mut D) -> R) -> Result<R, SqlOffloadError> {
        self.sync("with_native", |state| state.driver_mut("with_native").map(func))
    }

    /// Run `func` against the native handle and the currently stored native
    /// result, if any, on the calling thread.
    ///
    /// # Errors
    /// [`SqlOffloadError::UsageError`] when the connection is not open or busy.
    pub fn with_native_result<R>(
        &self,
        func: impl FnOnce(Option<&mut D::Result>) -> R,
    ) -> Result<R, SqlOffloadError> {
        self.sync("with_native_result", |state| {
            if !state.is_initialized() {
                return Err(SqlOffloadError::usage(
                    "with_native_result: connection is not open",
                ));
            }
            Ok(func(state.current_result_mut()))
        })
    }

    /// Invalidate every outstanding asynchronous operation. Their handlers
    /// still run once, with [`SqlOffloadError::CancellationError`]. A driver
    /// call already running on the worker completes regardless.
    pub fn cancel(&self) {
        let generation = self.status().bump_generation();
        debug!(generation, "connection cancelled");
    }

    /// Close the connection: cancel outstanding operations, expire every
    /// result set and release the native handle. Safe to call repeatedly.
    ///
    /// Never waits for a driver call running on the worker; in that case
    /// the handle is released on the worker right after that call.
    pub fn close(&self) {
        let was_open = self.is_open();
        let status = self.status();
        status.request_close();
        status.bump_generation();
        status.expire_results();
        status.set_phase(ConnectionPhase::Closed);

        match self.shared.state.try_lock() {
            Ok(mut state) => self.shared.settle(&mut state),
            Err(TryLockError::Poisoned(poisoned)) => {
                self.shared.settle(&mut poisoned.into_inner());
            }
            // Only the synchronous path can hold the lock without a worker.
            Err(TryLockError::WouldBlock) if !self.service.is_worker_started() => {
                drop(self.shared.lock_state());
            }
            Err(TryLockError::WouldBlock) => {
                let shared = Arc::clone(&self.shared);
                let deferred = self.service.executor().submit(
                    "close",
                    Box::new(move || drop(shared.lock_state())),
                );
                if deferred.is_err() {
                    drop(self.shared.lock_state());
                }
            }
        }
        if was_open {
            debug!("connection closed");
        }
    }
}

impl<D: Driver> Drop for Connection<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: Driver> fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("busy", &self.is_busy())
            .finish()
    }
}
