use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::Duration;

/// Client capability bitmask handed to the driver at connect time.
///
/// The constants follow the classic MySQL client flag layout; drivers interpret
/// whichever bits they understand and ignore the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClientFlags(u32);

impl ClientFlags {
    pub const FOUND_ROWS: ClientFlags = ClientFlags(1 << 1);
    pub const CONNECT_WITH_DB: ClientFlags = ClientFlags(1 << 3);
    pub const COMPRESS: ClientFlags = ClientFlags(1 << 5);
    pub const LOCAL_FILES: ClientFlags = ClientFlags(1 << 7);
    pub const IGNORE_SPACE: ClientFlags = ClientFlags(1 << 8);
    pub const INTERACTIVE: ClientFlags = ClientFlags(1 << 10);
    pub const SSL: ClientFlags = ClientFlags(1 << 11);
    pub const TRANSACTIONS: ClientFlags = ClientFlags(1 << 13);
    pub const MULTI_STATEMENTS: ClientFlags = ClientFlags(1 << 16);
    pub const MULTI_RESULTS: ClientFlags = ClientFlags(1 << 17);

    #[must_use]
    pub const fn empty() -> Self {
        ClientFlags(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        ClientFlags(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: ClientFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ClientFlags {
    type Output = ClientFlags;

    fn bitor(self, rhs: ClientFlags) -> ClientFlags {
        ClientFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClientFlags {
    fn bitor_assign(&mut self, rhs: ClientFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ClientFlags {
    type Output = ClientFlags;

    fn bitand(self, rhs: ClientFlags) -> ClientFlags {
        ClientFlags(self.0 & rhs.0)
    }
}

/// Credential pair presented to the server on connect.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    user: Option<String>,
    password: Option<String>,
}

impl AuthInfo {
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: Some(password.into()),
        }
    }

    #[must_use]
    pub fn user_only(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            password: None,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Connection-level options, each mapped 1:1 onto a driver option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOption {
    ConnectTimeout(Duration),
    ReadTimeout(Duration),
    WriteTimeout(Duration),
    /// Toggle the driver's own non-blocking mode.
    Nonblock(bool),
    Reconnect(bool),
    /// Statement executed right after every successful connect.
    InitCommand(String),
}

impl ConnectOption {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ConnectOption::ConnectTimeout(_) => "connect_timeout",
            ConnectOption::ReadTimeout(_) => "read_timeout",
            ConnectOption::WriteTimeout(_) => "write_timeout",
            ConnectOption::Nonblock(_) => "nonblock",
            ConnectOption::Reconnect(_) => "reconnect",
            ConnectOption::InitCommand(_) => "init_command",
        }
    }
}

/// Observable lifecycle phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionPhase {
    Closed = 0,
    Open = 1,
    Connected = 2,
    Querying = 3,
    ResultAvailable = 4,
}

impl ConnectionPhase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionPhase::Open,
            2 => ConnectionPhase::Connected,
            3 => ConnectionPhase::Querying,
            4 => ConnectionPhase::ResultAvailable,
            _ => ConnectionPhase::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test_membership() {
        let flags = ClientFlags::MULTI_STATEMENTS | ClientFlags::MULTI_RESULTS;
        assert!(flags.contains(ClientFlags::MULTI_STATEMENTS));
        assert!(!flags.contains(ClientFlags::COMPRESS));
        assert_eq!(flags.bits(), (1 << 16) | (1 << 17));
        assert!(ClientFlags::empty().is_empty());
    }

    #[test]
    fn auth_debug_hides_password() {
        let auth = AuthInfo::new("root", "hunter2");
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("root"));
        assert!(!rendered.contains("hunter2"));
    }
}
