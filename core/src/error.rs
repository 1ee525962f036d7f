//! Error types for the OpenERP client.
//!
//! # Design
//! Every operation returns `Result<_, OerpError>`, so a failed call is never
//! confused with an empty search or a `false` from `write`. A remote
//! `<fault>` gets its own variant because callers routinely branch on
//! "the server refused" versus "the request never got an answer."
//! `browse` has a separate `MaterializationError` so callers of the typed
//! API deal with one error shape regardless of what went wrong underneath.

use oerp_xmlrpc::XmlRpcError;
use thiserror::Error;

use crate::types::RecordId;

/// Failure below HTTP: connection refused, DNS, broken pipe, unreadable body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned by `ObjectClient` parse methods and `Connection` operations.
#[derive(Debug, Error)]
pub enum OerpError {
    /// The request could not be delivered or the response not received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-200 status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The server answered with an XML-RPC fault.
    #[error("remote fault {code}: {message}")]
    Fault { code: String, message: String },

    /// The body is not a valid XML-RPC response.
    #[error("could not decode response: {0}")]
    Decode(#[from] XmlRpcError),

    /// The response decoded but has the wrong shape for the operation.
    #[error("unexpected response: expected {expected}, found {found}")]
    UnexpectedResponse {
        expected: &'static str,
        found: String,
    },

    /// Host or port cannot form an endpoint URL.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),

    /// `login` did not return a user id.
    #[error("authentication failed for {username:?} on database {database:?}")]
    AuthenticationFailed { database: String, username: String },

    /// Connection settings could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl OerpError {
    pub(crate) fn unexpected(expected: &'static str, found: impl Into<String>) -> Self {
        OerpError::UnexpectedResponse {
            expected,
            found: found.into(),
        }
    }
}

/// Errors from `Connection::browse` and its variants.
#[derive(Debug, Error)]
pub enum MaterializationError {
    /// The underlying `read` failed.
    #[error("read returned no data: {0}")]
    Read(#[source] OerpError),

    /// A requested id has no record in the `read` response.
    #[error("record {0} was not returned by read")]
    MissingRecord(RecordId),

    /// The construction contract rejected a record.
    #[error("could not construct {model} record: {message}")]
    Construction {
        model: String,
        id: Option<RecordId>,
        message: String,
    },
}

/// Errors from the typed accessors on `Record`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("missing field {0:?}")]
    Missing(String),

    #[error("field {field:?}: expected {expected}, found {found}")]
    Type {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}
