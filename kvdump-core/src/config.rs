//! Connection parameters for a single pipeline invocation

use crate::error::{DumpError, Result};
use std::fmt;
use std::time::Duration;

/// Default etcd client endpoint
pub const DEFAULT_ADDRESS: &str = "localhost:2379";

/// Default time allowed to open and authenticate a session
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time budget for each range read or put
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Username and password presented to the store
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse a `username:password` token.
    ///
    /// The token must split on `:` into exactly two non-empty parts.
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split(':').collect();
        match parts.as_slice() {
            [user, pass] if !user.is_empty() && !pass.is_empty() => Ok(Self::new(*user, *pass)),
            _ => Err(DumpError::configuration("use username:password")),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open one session
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Endpoint, either `host:port` or a full `http(s)://` URI
    pub address: String,
    pub credentials: Credentials,
    pub dial_timeout: Duration,
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            address: address.into(),
            credentials,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject configurations no connector could use
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(DumpError::configuration("address shouldn't be empty"));
        }
        if self.dial_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(DumpError::configuration("timeouts must be non-zero"));
        }
        Ok(())
    }
}
