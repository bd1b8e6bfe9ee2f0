//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits.

pub use crate::config::{ServiceOptions, ServiceOptionsBuilder};
pub use crate::connection::Connection;
pub use crate::driver::{Driver, DriverResult};
pub use crate::endpoint::{Endpoint, FileEndpoint, MemoryEndpoint, TcpEndpoint, UnixEndpoint};
pub use crate::error::{DriverError, SqlOffloadError};
pub use crate::handler::{CompletionHandler, PendingOperation};
pub use crate::results::{FieldInfo, FieldType, FromField, ResultSet, Row};
pub use crate::service::Service;
pub use crate::types::{AuthInfo, ClientFlags, ConnectOption, ConnectionPhase};

#[cfg(feature = "sqlite")]
pub use crate::{SqliteConn, SqliteDriver, SqliteService};
