//! Asynchronous, callback-friendly access to a blocking database client.
//!
//! A [`Service`] owns one lazily started worker thread. Every
//! [`Connection`] created from it can run its driver calls either
//! synchronously on the caller's thread or asynchronously on that worker,
//! delivering the outcome through an awaited [`PendingOperation`] or a
//! [`CompletionHandler`].
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn demo() -> sql_offload::Result<()> {
//! use sql_offload::prelude::*;
//!
//! let service = SqliteService::new()?;
//! let conn = service.connection();
//! conn.open()?;
//! conn.connect_async(&MemoryEndpoint, &AuthInfo::anonymous(), "main", ClientFlags::empty())
//!     .await?;
//! let rows = conn.query_result_async("SELECT 1 AS one").await?;
//! assert_eq!(rows.at(0)?.get::<i64>(0)?, 1);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod library;
pub mod native;
pub mod prelude;
pub mod results;
pub mod types;

mod connection;
mod executor;
mod handler;
mod service;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ServiceOptions, ServiceOptionsBuilder};
pub use connection::Connection;
pub use driver::{Driver, DriverResult, OptionError, RawRow};
pub use endpoint::{Endpoint, EndpointAddr, FileEndpoint, MemoryEndpoint, TcpEndpoint, UnixEndpoint};
pub use error::{DriverError, SqlOffloadError};
pub use handler::{CompletionHandler, PendingOperation};
pub use results::{FieldInfo, FieldType, FromField, ResultSet, Row};
pub use service::Service;
pub use types::{AuthInfo, ClientFlags, ConnectOption, ConnectionPhase};

pub use error::SqlOffloadError as Error;
pub use error::Result;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

/// A [`Service`] backed by the bundled SQLite driver.
#[cfg(feature = "sqlite")]
pub type SqliteService = Service<sqlite::SqliteDriver>;

/// A [`Connection`] backed by the bundled SQLite driver.
#[cfg(feature = "sqlite")]
pub type SqliteConn = Connection<sqlite::SqliteDriver>;
