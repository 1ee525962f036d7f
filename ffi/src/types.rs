//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Requests and results are plain C data. Scalar results (ids, counts,
//! booleans) travel in `value`, id lists in `ids`/`ids_len`, and anything
//! structured (records, passthrough results) as a JSON string in `json`.
//! Conversion helpers live here to keep `lib.rs` focused on the
//! `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use oerp_core::{ConnectOptions, ObjectClient, OerpError, RecordId};

/// Opaque handle holding connection options and, after a successful
/// `oerp_parse_login`, the authenticated client.
pub struct FfiOerpClient {
    pub(crate) options: ConnectOptions,
    pub(crate) client: Option<ObjectClient>,
}

/// Copy a Rust string into a heap C string owned by the caller.
///
/// Interior NUL bytes cannot be represented and are dropped.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let mut s: String = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).unwrap_or_default().into_raw()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An XML-RPC request to send as `POST url` with `body`.
///
/// Built by `oerp_build_*` functions. The C caller executes the request
/// and passes the response back through the matching `oerp_parse_*`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: oerp_core::HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: c_string(k),
                    value: c_string(v),
                })
                .collect();
            Box::into_raw(headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            url: c_string(req.url),
            headers,
            headers_len,
            body: c_string(req.body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller fills this in after executing a request; the FFI layer
/// reads but does not free it.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiOerpResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Http = 1,
    Fault = 2,
    Decode = 3,
    UnexpectedResponse = 4,
    AuthenticationFailed = 5,
    InvalidAddress = 6,
    Transport = 7,
    InvalidArgument = 8,
    NotLoggedIn = 9,
    NullArg = 10,
    Panic = 11,
}

/// Which payload field of `FfiOerpResult` is set.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    /// A record id (or uid after login) in `value`.
    Id = 1,
    /// A list of ids in `ids`/`ids_len`.
    Ids = 2,
    /// A match count in `value`.
    Count = 3,
    /// `value` is 0 or 1.
    Bool = 4,
    /// A JSON document in `json`.
    Json = 5,
}

/// Result envelope for all parse operations.
///
/// On failure `error_code` is not `Ok`, `error_message` is a C string,
/// `http_status` carries the status for `Http` errors, and `data_tag` is
/// `None`.
#[repr(C)]
pub struct FfiOerpResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub value: i64,
    pub ids: *mut RecordId,
    pub ids_len: u32,
    pub json: *mut c_char,
}

impl FfiOerpResult {
    fn empty(error_code: FfiErrorCode, data_tag: FfiDataTag) -> Self {
        FfiOerpResult {
            error_code,
            error_message: std::ptr::null_mut(),
            http_status: 0,
            data_tag,
            value: 0,
            ids: std::ptr::null_mut(),
            ids_len: 0,
            json: std::ptr::null_mut(),
        }
    }

    pub(crate) fn ok_id(id: RecordId) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, FfiDataTag::Id);
        result.value = i64::from(id);
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn ok_count(n: usize) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, FfiDataTag::Count);
        result.value = n as i64;
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn ok_bool(b: bool) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, FfiDataTag::Bool);
        result.value = i64::from(b);
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn ok_ids(ids: Vec<RecordId>) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, FfiDataTag::Ids);
        result.ids_len = ids.len() as u32;
        if !ids.is_empty() {
            result.ids = Box::into_raw(ids.into_boxed_slice()) as *mut RecordId;
        }
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn ok_json(json: serde_json::Value) -> *mut Self {
        let mut result = Self::empty(FfiErrorCode::Ok, FfiDataTag::Json);
        result.json = c_string(json.to_string());
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn error(code: FfiErrorCode, msg: impl Into<String>) -> *mut Self {
        Self::error_with_status(code, msg, 0)
    }

    fn error_with_status(code: FfiErrorCode, msg: impl Into<String>, http_status: u16) -> *mut Self {
        let mut result = Self::empty(code, FfiDataTag::None);
        result.error_message = c_string(msg);
        result.http_status = http_status;
        Box::into_raw(Box::new(result))
    }

    pub(crate) fn from_error(err: OerpError) -> *mut Self {
        let (code, status) = match &err {
            OerpError::Http { status, .. } => (FfiErrorCode::Http, *status),
            OerpError::Fault { .. } => (FfiErrorCode::Fault, 0),
            OerpError::Decode(_) => (FfiErrorCode::Decode, 0),
            OerpError::UnexpectedResponse { .. } => (FfiErrorCode::UnexpectedResponse, 0),
            OerpError::AuthenticationFailed { .. } => (FfiErrorCode::AuthenticationFailed, 0),
            OerpError::InvalidAddress(_) => (FfiErrorCode::InvalidAddress, 0),
            OerpError::Transport(_) => (FfiErrorCode::Transport, 0),
            OerpError::Config(_) => (FfiErrorCode::InvalidArgument, 0),
        };
        Self::error_with_status(code, err.to_string(), status)
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    pub(crate) fn not_logged_in() -> *mut Self {
        Self::error(FfiErrorCode::NotLoggedIn, "client has no session; call oerp_parse_login first")
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }
}
