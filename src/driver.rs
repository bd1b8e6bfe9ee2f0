//! The blocking client API this crate adapts.
//!
//! A [`Driver`] is a single native connection handle. It is only ever touched
//! by one thread at a time: either the caller on the synchronous path or the
//! service worker on the asynchronous one.

use crate::endpoint::EndpointAddr;
use crate::error::DriverError;
use crate::results::FieldInfo;
use crate::types::{AuthInfo, ClientFlags, ConnectOption};

/// One fetched row: raw bytes per column, `None` for SQL NULL.
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Failure of [`Driver::set_option`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The driver has no counterpart for this option.
    Unsupported(&'static str),
    Driver(DriverError),
}

pub trait Driver: Send + Sized + 'static {
    /// Native result handle produced by [`Driver::store_result`].
    type Result: DriverResult;

    /// Shared, process-independent state every handle is created from.
    type Context: Clone + Send + Sync + 'static;

    /// One-time process-wide library setup. Reference counted by
    /// [`LibraryGuard`](crate::library::LibraryGuard).
    ///
    /// # Errors
    /// Returns the driver's error when the library cannot be initialized.
    fn library_init() -> Result<(), DriverError> {
        Ok(())
    }

    /// Counterpart of [`Driver::library_init`], run when the last service goes away.
    fn library_end() {}

    /// Allocate a fresh, unconnected handle.
    ///
    /// # Errors
    /// Returns the driver's error when the handle cannot be allocated.
    fn init(context: &Self::Context) -> Result<Self, DriverError>;

    /// # Errors
    /// See [`OptionError`].
    fn set_option(&mut self, option: &ConnectOption) -> Result<(), OptionError>;

    /// # Errors
    /// Returns the driver's error when the server rejects the connection.
    fn connect(
        &mut self,
        addr: &EndpointAddr,
        auth: &AuthInfo,
        database: &str,
        flags: ClientFlags,
    ) -> Result<(), DriverError>;

    /// Send one statement (or a multi-statement string when enabled).
    ///
    /// # Errors
    /// Returns the driver's error when the statement fails.
    fn query(&mut self, statement: &str) -> Result<(), DriverError>;

    /// Column count of the current pending result; zero for statements without rows.
    fn field_count(&self) -> u32;

    /// Take the current result. `Ok(None)` means the statement produced no rows.
    ///
    /// # Errors
    /// Returns the driver's error when the result cannot be retrieved.
    fn store_result(&mut self) -> Result<Option<Self::Result>, DriverError>;

    /// Whether a multi-statement query has results after the current one.
    fn more_results(&self) -> bool;

    /// Advance to the next pending result.
    ///
    /// # Errors
    /// Returns the driver's error when the next statement of the batch failed.
    fn next_result(&mut self) -> Result<(), DriverError>;

    fn affected_rows(&self) -> u64;

    /// # Errors
    /// Returns the driver's error when the mode cannot be changed.
    fn autocommit(&mut self, mode: bool) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when the commit fails.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// # Errors
    /// Returns the driver's error when the rollback fails.
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Text of the most recent error on this handle, empty if none.
    fn error_message(&self) -> String;

    /// Release the native handle. Called exactly once by the owning guard.
    fn close(&mut self);
}

/// A stored native result: row count, field metadata and a row cursor.
pub trait DriverResult: Send + 'static {
    fn num_rows(&self) -> u64;

    fn fields(&mut self) -> Vec<FieldInfo>;

    /// Next row, `Ok(None)` once exhausted.
    ///
    /// # Errors
    /// Returns the driver's error when the row cannot be read.
    fn fetch_row(&mut self) -> Result<Option<RawRow>, DriverError>;

    /// Release the native result. Called exactly once by the owning guard.
    fn free(&mut self) {}
}
