//! Connection settings and the authenticated session.
//!
//! # Design
//! `ConnectOptions` is what the caller knows before login; `Session` is what
//! exists after it. A `Session` can only be produced from options plus the
//! uid returned by `login`, so no object call can be built without one.
//! Both types keep the password in memory as plain text for their whole
//! lifetime; `Debug` and `Display` never print it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OerpError;
use crate::types::RecordId;

/// Default OpenERP XML-RPC port.
pub const DEFAULT_PORT: u16 = 8069;

const COMMON_PATH: &str = "/xmlrpc/common";
const OBJECT_PATH: &str = "/xmlrpc/object";

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Everything needed to log in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    #[serde(alias = "user")]
    pub username: String,
    pub password: String,
}

impl ConnectOptions {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Load options from `OERP_HOST`, `OERP_PORT` (default 8069),
    /// `OERP_DATABASE`, `OERP_USER` and `OERP_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns `OerpError::Config` if a required variable is missing or the
    /// port is not a number.
    pub fn from_env() -> Result<Self, OerpError> {
        fn var(name: &str) -> Result<String, OerpError> {
            std::env::var(name).map_err(|_| OerpError::Config(format!("{name} is not set")))
        }

        let port = match std::env::var("OERP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| OerpError::Config(format!("OERP_PORT is not a port: {raw:?}")))?,
            Err(_) => DEFAULT_PORT,
        };
        Ok(Self {
            host: var("OERP_HOST")?,
            port,
            database: var("OERP_DATABASE")?,
            username: var("OERP_USER")?,
            password: var("OERP_PASSWORD")?,
        })
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, OerpError> {
        serde_json::from_str(json).map_err(|e| OerpError::Config(e.to_string()))
    }

    /// URL of the authentication endpoint.
    pub fn common_url(&self) -> Result<String, OerpError> {
        self.endpoint(COMMON_PATH)
    }

    /// URL of the object endpoint.
    pub fn object_url(&self) -> Result<String, OerpError> {
        self.endpoint(OBJECT_PATH)
    }

    fn endpoint(&self, path: &str) -> Result<String, OerpError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(OerpError::InvalidAddress("empty host".to_string()));
        }
        if host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(OerpError::InvalidAddress(format!("bad host {host:?}")));
        }
        if self.port == 0 {
            return Err(OerpError::InvalidAddress("port 0".to_string()));
        }
        // IPv6 literals need brackets in a URL authority.
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        };
        Ok(format!("http://{authority}{path}"))
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session. Immutable once created.
#[derive(Clone)]
pub struct Session {
    options: ConnectOptions,
    uid: RecordId,
    object_url: String,
}

impl Session {
    /// Bind `uid` (the result of `login`) to the object endpoint.
    ///
    /// # Errors
    ///
    /// Returns `OerpError::InvalidAddress` if host or port are unusable.
    pub fn new(options: ConnectOptions, uid: RecordId) -> Result<Self, OerpError> {
        let object_url = options.object_url()?;
        Ok(Self {
            options,
            uid,
            object_url,
        })
    }

    pub fn host(&self) -> &str {
        &self.options.host
    }

    pub fn port(&self) -> u16 {
        self.options.port
    }

    pub fn database(&self) -> &str {
        &self.options.database
    }

    pub fn username(&self) -> &str {
        &self.options.username
    }

    pub fn uid(&self) -> RecordId {
        self.uid
    }

    pub fn object_url(&self) -> &str {
        &self.object_url
    }

    pub(crate) fn password(&self) -> &str {
        &self.options.password
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("uid", &self.uid)
            .field("object_url", &self.object_url)
            .finish()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{} (uid {})",
            self.options.username, self.options.host, self.options.port, self.options.database, self.uid
        )
    }
}
