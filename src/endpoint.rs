use std::fmt::Debug;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use crate::error::DriverError;

/// Concrete address a driver connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
    /// Embedded database file.
    File(PathBuf),
    /// Private in-memory database.
    Memory,
}

/// Something that can be resolved into an [`EndpointAddr`].
///
/// Resolution runs on the worker thread for asynchronous connects, so an
/// implementation is free to block (DNS lookups and the like).
pub trait Endpoint: Debug + Clone + Send + Sync + 'static {
    /// # Errors
    /// Returns a [`DriverError`] when the address cannot be resolved.
    fn resolve(&self) -> Result<EndpointAddr, DriverError>;
}

/// Code reported when an endpoint fails to resolve.
pub const RESOLVE_ERROR: i32 = 2005;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEndpoint {
    host: String,
    port: u16,
}

impl TcpEndpoint {
    pub const DEFAULT_PORT: u16 = 3306;

    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<SocketAddr> for TcpEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl Endpoint for TcpEndpoint {
    fn resolve(&self) -> Result<EndpointAddr, DriverError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|err| {
                DriverError::new(
                    RESOLVE_ERROR,
                    format!("unknown host '{}': {err}", self.host),
                )
            })?
            .next()
            .map(EndpointAddr::Tcp)
            .ok_or_else(|| {
                DriverError::new(RESOLVE_ERROR, format!("no address for host '{}'", self.host))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixEndpoint {
    path: PathBuf,
}

impl UnixEndpoint {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Endpoint for UnixEndpoint {
    fn resolve(&self) -> Result<EndpointAddr, DriverError> {
        if self.path.as_os_str().is_empty() {
            return Err(DriverError::new(RESOLVE_ERROR, "empty unix socket path"));
        }
        Ok(EndpointAddr::Unix(self.path.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEndpoint {
    path: PathBuf,
}

impl FileEndpoint {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Endpoint for FileEndpoint {
    fn resolve(&self) -> Result<EndpointAddr, DriverError> {
        if self.path.as_os_str().is_empty() {
            return Err(DriverError::new(RESOLVE_ERROR, "empty database file path"));
        }
        Ok(EndpointAddr::File(self.path.clone()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryEndpoint;

impl Endpoint for MemoryEndpoint {
    fn resolve(&self) -> Result<EndpointAddr, DriverError> {
        Ok(EndpointAddr::Memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_literal_address_resolves_without_lookup() {
        let addr = TcpEndpoint::new("127.0.0.1", 3306).resolve().unwrap();
        assert_eq!(addr, EndpointAddr::Tcp("127.0.0.1:3306".parse().unwrap()));
    }

    #[test]
    fn empty_paths_are_rejected() {
        let err = FileEndpoint::new("").resolve().unwrap_err();
        assert_eq!(err.code, RESOLVE_ERROR);
        assert!(UnixEndpoint::new("").resolve().is_err());
    }
}
