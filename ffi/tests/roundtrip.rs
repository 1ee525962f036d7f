//! Drive the C ABI against the live mock server, doing the HTTP here the
//! way a C host would.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use oerp_ffi::types::{FfiDataTag, FfiErrorCode, FfiHttpRequest, FfiHttpResponse, FfiOerpResult};
use oerp_ffi::*;

fn start_server() -> u16 {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = std_listener.local_addr().unwrap().port();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    port
}

fn c_str<'a>(ptr: *const c_char) -> &'a str {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap()
}

/// POST the request with ureq, free it, and hand the parser the response.
fn send(
    req: *mut FfiHttpRequest,
    parse: impl FnOnce(&FfiHttpResponse) -> *mut FfiOerpResult,
) -> *mut FfiOerpResult {
    assert!(!req.is_null());
    let r = unsafe { &*req };
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let mut response = agent
        .post(c_str(r.url))
        .content_type("text/xml")
        .send(c_str(r.body).as_bytes())
        .expect("HTTP transport error");
    let status = response.status().as_u16();
    let body = CString::new(response.body_mut().read_to_string().unwrap()).unwrap();
    oerp_free_request(req);

    parse(&FfiHttpResponse {
        status,
        body: body.as_ptr(),
    })
}

fn take(result: *mut FfiOerpResult) -> (FfiErrorCode, FfiDataTag, i64, Vec<i32>, Option<String>) {
    let r = unsafe { &*result };
    let ids = if r.ids.is_null() {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(r.ids, r.ids_len as usize) }.to_vec()
    };
    let json = (!r.json.is_null()).then(|| c_str(r.json).to_string());
    let out = (r.error_code, r.data_tag, r.value, ids, json);
    oerp_free_result(result);
    out
}

fn client(port: u16, password: &str) -> *mut oerp_ffi::types::FfiOerpClient {
    let host = CString::new("127.0.0.1").unwrap();
    let db = CString::new("demo").unwrap();
    let user = CString::new("admin").unwrap();
    let pwd = CString::new(password).unwrap();
    oerp_client_new(host.as_ptr(), port, db.as_ptr(), user.as_ptr(), pwd.as_ptr())
}

#[test]
fn login_create_search_read_write_unlink() {
    let port = start_server();
    let c = client(port, "admin");
    let model = CString::new("res.partner").unwrap();

    // login
    let (code, tag, uid, _, _) = take(send(oerp_build_login(c), |r| oerp_parse_login(c, r)));
    assert_eq!((code, tag, uid), (FfiErrorCode::Ok, FfiDataTag::Id, 1));

    // create two partners
    let mut created = Vec::new();
    for name in ["Agrolait", "Camptocamp"] {
        let values = CString::new(format!(r#"{{"name":"{name}"}}"#)).unwrap();
        let req = oerp_build_create(c, model.as_ptr(), values.as_ptr(), std::ptr::null());
        let (code, tag, id, _, _) = take(send(req, |r| oerp_parse_create(c, r)));
        assert_eq!((code, tag), (FfiErrorCode::Ok, FfiDataTag::Id));
        created.push(id as i32);
    }

    // search, reversed
    let req = oerp_build_search(c, model.as_ptr(), std::ptr::null(), 0, 0, std::ptr::null(), false);
    let (_, tag, _, ids, _) = take(send(req, |r| oerp_parse_search(c, r, true, false)));
    assert_eq!(tag, FfiDataTag::Ids);
    assert_eq!(ids, vec![created[1], created[0]]);

    // count
    let req = oerp_build_search(c, model.as_ptr(), std::ptr::null(), 0, 0, std::ptr::null(), true);
    let (_, tag, n, _, _) = take(send(req, |r| oerp_parse_search(c, r, false, true)));
    assert_eq!((tag, n), (FfiDataTag::Count, 2));

    // write then read
    let values = CString::new(r#"{"city":"Wavre"}"#).unwrap();
    let context = CString::new(r#"{"lang":"fr_FR"}"#).unwrap();
    let req = oerp_build_write(c, model.as_ptr(), created.as_ptr(), 1, values.as_ptr(), context.as_ptr());
    let (_, tag, ok, _, _) = take(send(req, |r| oerp_parse_write(c, r)));
    assert_eq!((tag, ok), (FfiDataTag::Bool, 1));

    let fields = CString::new(r#"["name","city"]"#).unwrap();
    let req = oerp_build_read(c, model.as_ptr(), created.as_ptr(), 2, fields.as_ptr());
    let (_, tag, _, _, json) =
        take(send(req, |r| oerp_parse_read(c, r, created.as_ptr(), 2)));
    assert_eq!(tag, FfiDataTag::Json);
    let records: serde_json::Value = serde_json::from_str(&json.unwrap()).unwrap();
    assert_eq!(records[0]["name"], "Agrolait");
    assert_eq!(records[0]["city"], "Wavre");
    assert_eq!(records[1]["city"], false);

    // unlink then read nothing
    let req = oerp_build_unlink(c, model.as_ptr(), created.as_ptr(), 2);
    let (code, _, _, _, _) = take(send(req, |r| oerp_parse_unlink(c, r)));
    assert_eq!(code, FfiErrorCode::Ok);

    let req = oerp_build_read(c, model.as_ptr(), created.as_ptr(), 2, std::ptr::null());
    let (_, _, _, _, json) = take(send(req, |r| oerp_parse_read(c, r, created.as_ptr(), 2)));
    assert_eq!(json.as_deref(), Some("[]"));

    oerp_client_free(c);
}

#[test]
fn bad_password_is_authentication_failed() {
    let port = start_server();
    let c = client(port, "wrong");
    let (code, tag, _, _, _) = take(send(oerp_build_login(c), |r| oerp_parse_login(c, r)));
    assert_eq!(code, FfiErrorCode::AuthenticationFailed);
    assert_eq!(tag, FfiDataTag::None);
    assert_eq!(oerp_client_uid(c), -1);
    oerp_client_free(c);
}
