//! C-ABI wrapper around `oerp-core`.
//!
//! # Overview
//! Exposes login and the object operations through `extern "C"` functions
//! so any language with a C FFI can build XML-RPC requests, send them with
//! its own HTTP stack, and parse the responses.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-operation `build_*` / `parse_*` mirrors `ObjectClient` 1:1.
//!   `oerp_parse_login` stores the session in the handle; every other
//!   operation needs it.
//! - Structured inputs (values, domains, field lists, call arguments) are
//!   JSON strings. Records and passthrough results come back as JSON.
//! - The C caller owns all returned pointers and must call the matching
//!   `oerp_free_*` function to release them.
//! - A handle may be shared between threads for `build_*`/`parse_*` once
//!   logged in; `oerp_parse_login` mutates it and must not race with them.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use oerp_core::{
    domain_from_json, ConnectOptions, Context, HttpResponse, ObjectClient, RecordId, SearchParams,
    SearchResult, Value, Values,
};

use types::*;

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn read_json(ptr: *const c_char) -> Option<serde_json::Value> {
    serde_json::from_str(read_str(ptr)?).ok()
}

/// A JSON object of field values.
fn read_values(ptr: *const c_char) -> Option<Values> {
    match Value::from(read_json(ptr)?) {
        Value::Struct(values) => Some(values),
        _ => None,
    }
}

/// An optional JSON object sent as the call context. Null means no context;
/// the outer `None` marks a non-null argument that is not a JSON object.
fn read_context(ptr: *const c_char) -> Option<Option<Context>> {
    if ptr.is_null() {
        return Some(None);
    }
    read_values(ptr).map(Some)
}

/// `ids_len` ids at `ids`; a null pointer is only valid with length zero.
fn read_ids(ids: *const RecordId, ids_len: u32) -> Option<Vec<RecordId>> {
    if ids_len == 0 {
        return Some(Vec::new());
    }
    if ids.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(ids, ids_len as usize) }.to_vec())
}

/// The logged-in client behind a handle, if any.
fn session_client<'a>(client: *const FfiOerpClient) -> Option<&'a ObjectClient> {
    if client.is_null() {
        return None;
    }
    unsafe { &*client }.client.as_ref()
}

fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = read_str(resp.body).unwrap_or_default().to_string();
    HttpResponse {
        status: resp.status,
        headers: Vec::new(),
        body,
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a handle for one server, database and user.
///
/// Returns null if any string argument is null or not UTF-8. The handle
/// has no session until `oerp_parse_login` succeeds. Free it with
/// `oerp_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_client_new(
    host: *const c_char,
    port: u16,
    database: *const c_char,
    username: *const c_char,
    password: *const c_char,
) -> *mut FfiOerpClient {
    catch_unwind(|| {
        let (Some(host), Some(database), Some(username), Some(password)) = (
            read_str(host),
            read_str(database),
            read_str(username),
            read_str(password),
        ) else {
            return std::ptr::null_mut();
        };
        let options = ConnectOptions::new(host, port, database, username, password);
        Box::into_raw(Box::new(FfiOerpClient {
            options,
            client: None,
        }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a handle created by `oerp_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_client_free(client: *mut FfiOerpClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

/// The logged-in user id, or -1 if the handle has no session.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_client_uid(client: *const FfiOerpClient) -> i32 {
    catch_unwind(|| session_client(client).map_or(-1, |c| c.session().uid())).unwrap_or(-1)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Build the `login` request. Returns null if `client` is null or the
/// host/port cannot form a URL.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_login(client: *const FfiOerpClient) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match ObjectClient::build_login(&client.options) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Parse the `login` response and store the session in the handle.
///
/// Returns `data_tag = Id` with the uid on success. On failure any
/// previous session is kept.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_login(
    client: *mut FfiOerpClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiOerpResult::null_arg("client");
        }
        if response.is_null() {
            return FfiOerpResult::null_arg("response");
        }
        let client = unsafe { &mut *client };
        let resp = ffi_response_to_core(unsafe { &*response });
        match ObjectClient::parse_login(client.options.clone(), resp) {
            Ok(logged_in) => {
                let uid = logged_in.session().uid();
                client.client = Some(logged_in);
                FfiOerpResult::ok_id(uid)
            }
            Err(e) => FfiOerpResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_login"))
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------
//
// All return null if the handle has no session, a required argument is
// null, or a JSON argument does not have the documented shape. The caller
// frees the request with `oerp_free_request`.

/// Build `create`. `values_json` is a JSON object of field values;
/// `context_json` is a JSON object such as `{"lang": "fr_FR"}`, or null.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_create(
    client: *const FfiOerpClient,
    model: *const c_char,
    values_json: *const c_char,
    context_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model), Some(values), Some(context)) = (
            session_client(client),
            read_str(model),
            read_values(values_json),
            read_context(context_json),
        ) else {
            return std::ptr::null_mut();
        };
        FfiHttpRequest::from_core(c.build_create(model, &values, context.as_ref()))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build `search`.
///
/// `domain_json` is a JSON array of `[field, operator, value]` triples and
/// `"&"`, `"|"`, `"!"` operators; null means no filter. `limit` 0 means no
/// limit; `order` may be null. `reverse` must be passed again to
/// `oerp_parse_search`.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_search(
    client: *const FfiOerpClient,
    model: *const c_char,
    domain_json: *const c_char,
    offset: u32,
    limit: u32,
    order: *const c_char,
    count: bool,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model)) = (session_client(client), read_str(model)) else {
            return std::ptr::null_mut();
        };
        let domain = if domain_json.is_null() {
            Vec::new()
        } else {
            match read_json(domain_json).and_then(domain_from_json) {
                Some(domain) => domain,
                None => return std::ptr::null_mut(),
            }
        };
        let mut params = SearchParams::new(domain).offset(offset).limit(limit).count(count);
        if let Some(order) = read_str(order) {
            params = params.order(order);
        }
        FfiHttpRequest::from_core(c.build_search(model, &params))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build `read`. `fields_json` is a JSON array of field names; null reads
/// every field.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_read(
    client: *const FfiOerpClient,
    model: *const c_char,
    ids: *const RecordId,
    ids_len: u32,
    fields_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model), Some(ids)) =
            (session_client(client), read_str(model), read_ids(ids, ids_len))
        else {
            return std::ptr::null_mut();
        };
        let fields: Vec<String> = if fields_json.is_null() {
            Vec::new()
        } else {
            match read_json(fields_json).and_then(|json| serde_json::from_value(json).ok()) {
                Some(fields) => fields,
                None => return std::ptr::null_mut(),
            }
        };
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        FfiHttpRequest::from_core(c.build_read(model, &ids, &fields))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build `write`. `values_json` and `context_json` as for
/// `oerp_build_create`.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_write(
    client: *const FfiOerpClient,
    model: *const c_char,
    ids: *const RecordId,
    ids_len: u32,
    values_json: *const c_char,
    context_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model), Some(ids), Some(values), Some(context)) = (
            session_client(client),
            read_str(model),
            read_ids(ids, ids_len),
            read_values(values_json),
            read_context(context_json),
        ) else {
            return std::ptr::null_mut();
        };
        FfiHttpRequest::from_core(c.build_write(model, &ids, &values, context.as_ref()))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build `unlink`.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_unlink(
    client: *const FfiOerpClient,
    model: *const c_char,
    ids: *const RecordId,
    ids_len: u32,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model), Some(ids)) =
            (session_client(client), read_str(model), read_ids(ids, ids_len))
        else {
            return std::ptr::null_mut();
        };
        FfiHttpRequest::from_core(c.build_unlink(model, &ids))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Build a call to any model method. `args_json` is a JSON array of
/// positional arguments; null means none.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_build_call(
    client: *const FfiOerpClient,
    model: *const c_char,
    method: *const c_char,
    args_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let (Some(c), Some(model), Some(method)) =
            (session_client(client), read_str(model), read_str(method))
        else {
            return std::ptr::null_mut();
        };
        let args = if args_json.is_null() {
            Vec::new()
        } else {
            match read_json(args_json).map(Value::from) {
                Some(Value::Array(args)) => args,
                _ => return std::ptr::null_mut(),
            }
        };
        FfiHttpRequest::from_core(c.build_call(model, method, args))
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Run `parse` against the handle's client and the converted response,
/// mapping null arguments and a missing session to error results.
fn parse_with(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
    parse: impl FnOnce(&ObjectClient, HttpResponse) -> *mut FfiOerpResult,
) -> *mut FfiOerpResult {
    if client.is_null() {
        return FfiOerpResult::null_arg("client");
    }
    if response.is_null() {
        return FfiOerpResult::null_arg("response");
    }
    let Some(c) = session_client(client) else {
        return FfiOerpResult::not_logged_in();
    };
    parse(c, ffi_response_to_core(unsafe { &*response }))
}

/// Parse a `create` response. `data_tag = Id` on success.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_create(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        parse_with(client, response, |c, resp| match c.parse_create(resp) {
            Ok(id) => FfiOerpResult::ok_id(id),
            Err(e) => FfiOerpResult::from_error(e),
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_create"))
}

/// Parse a `search` response. `count` must match the build call.
///
/// `data_tag = Count` when `count` is set, otherwise `Ids`, reversed when
/// `reverse` is set.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_search(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
    reverse: bool,
    count: bool,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        parse_with(client, response, |c, resp| {
            let params = SearchParams::default().reverse(reverse).count(count);
            match c.parse_search(&params, resp) {
                Ok(SearchResult::Count(n)) => FfiOerpResult::ok_count(n),
                Ok(SearchResult::Ids(ids)) => FfiOerpResult::ok_ids(ids),
                Err(e) => FfiOerpResult::from_error(e),
            }
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_search"))
}

/// Parse a `read` response. `ids` must be the ids the request was built
/// with; records come back in that order.
///
/// `data_tag = Json` with a JSON array of record objects.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_read(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
    ids: *const RecordId,
    ids_len: u32,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        let Some(ids) = read_ids(ids, ids_len) else {
            return FfiOerpResult::null_arg("ids");
        };
        parse_with(client, response, |c, resp| match c.parse_read(&ids, resp) {
            Ok(records) => {
                let json = records
                    .into_iter()
                    .map(|r| serde_json::Value::from(Value::Struct(r.into_inner())))
                    .collect();
                FfiOerpResult::ok_json(serde_json::Value::Array(json))
            }
            Err(e) => FfiOerpResult::from_error(e),
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_read"))
}

/// Parse a `write` response. `data_tag = Bool` on success.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_write(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        parse_with(client, response, |c, resp| match c.parse_write(resp) {
            Ok(b) => FfiOerpResult::ok_bool(b),
            Err(e) => FfiOerpResult::from_error(e),
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_write"))
}

/// Parse an `unlink` response. `data_tag = Bool` on success.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_unlink(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        parse_with(client, response, |c, resp| match c.parse_unlink(resp) {
            Ok(b) => FfiOerpResult::ok_bool(b),
            Err(e) => FfiOerpResult::from_error(e),
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_unlink"))
}

/// Parse the response of `oerp_build_call`. `data_tag = Json` with the
/// returned value.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_parse_call(
    client: *const FfiOerpClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOerpResult {
    catch_unwind(|| {
        parse_with(client, response, |c, resp| match c.parse_call(resp) {
            Ok(value) => FfiOerpResult::ok_json(serde_json::Value::from(value)),
            Err(e) => FfiOerpResult::from_error(e),
        })
    })
    .unwrap_or_else(|_| FfiOerpResult::panic("panic in oerp_parse_call"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Free a request returned by any `oerp_build_*` function. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    });
}

/// Free a result returned by any `oerp_parse_*` function. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_free_result(result: *mut FfiOerpResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.json);
        if !result.ids.is_null() && result.ids_len > 0 {
            drop(unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    result.ids,
                    result.ids_len as usize,
                ))
            });
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oerp_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| free_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
