//! Client binding for the OpenERP object service over XML-RPC.
//!
//! # Overview
//! Logs in against `/xmlrpc/common`, then drives `create`, `search`,
//! `read`, `write`, `unlink` and arbitrary model methods through
//! `execute` on `/xmlrpc/object`. `browse` turns read results into typed
//! objects through a caller-supplied construction contract.
//!
//! # Design
//! - `ObjectClient` is sans-IO: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`. Hosts that do their own I/O
//!   (the C ABI in `oerp-ffi`) use it directly.
//! - `Connection` pairs an `ObjectClient` with a blocking `Transport` for
//!   plain call-and-return use. `UreqTransport` is the default transport.
//! - Every operation returns a `Result`; failures are also logged at
//!   `debug` through `tracing`. The library never installs a subscriber.

pub mod browse;
pub mod client;
pub mod connection;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use browse::{materialize, FromRecord};
pub use client::ObjectClient;
pub use connection::Connection;
pub use error::{FieldError, MaterializationError, OerpError, TransportError};
pub use http::{HttpRequest, HttpResponse};
pub use oerp_xmlrpc::{Fault, Value};
pub use session::{ConnectOptions, Session, DEFAULT_PORT};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use transport::Transport;
pub use types::{
    domain_from_json, domain_value, Context, DomainTerm, Record, RecordId, SearchParams,
    SearchResult, Values,
};
