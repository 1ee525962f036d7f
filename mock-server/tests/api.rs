use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with, MockConfig, MockUser};
use oerp_xmlrpc::{decode_response, encode_call, MethodResponse, Value};
use tower::ServiceExt;

fn xml_request(uri: &str, method: &str, params: &[Value]) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "text/xml")
        .body(encode_call(method, params))
        .unwrap()
}

async fn send(app: &Router, request: Request<String>) -> MethodResponse {
    let resp = app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/xml");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    decode_response(std::str::from_utf8(&bytes).unwrap()).unwrap()
}

async fn execute(app: &Router, model: &str, method: &str, args: Vec<Value>) -> MethodResponse {
    let mut params = vec!["demo".into(), Value::Int(1), "admin".into(), model.into(), method.into()];
    params.extend(args);
    send(app, xml_request("/xmlrpc/object", "execute", &params)).await
}

fn success(resp: MethodResponse) -> Value {
    match resp {
        MethodResponse::Success(value) => value,
        MethodResponse::Fault(fault) => panic!("unexpected fault: {fault:?}"),
    }
}

fn partner(name: &str) -> Value {
    Value::Struct([("name".to_string(), Value::from(name))].into_iter().collect())
}

// --- common ---

#[tokio::test]
async fn login_admin_returns_uid() {
    let app = app();
    let resp = send(
        &app,
        xml_request("/xmlrpc/common", "login", &["demo".into(), "admin".into(), "admin".into()]),
    )
    .await;
    assert_eq!(success(resp), Value::Int(1));
}

#[tokio::test]
async fn login_bad_password_returns_false() {
    let app = app();
    let resp = send(
        &app,
        xml_request("/xmlrpc/common", "login", &["demo".into(), "admin".into(), "x".into()]),
    )
    .await;
    assert_eq!(success(resp), Value::Bool(false));
}

#[tokio::test]
async fn login_with_custom_config() {
    let app = app_with(MockConfig {
        database: "erp".to_string(),
        users: vec![MockUser {
            uid: 42,
            login: "bot".to_string(),
            password: "secret".to_string(),
        }],
    });
    let resp = send(
        &app,
        xml_request("/xmlrpc/common", "login", &["erp".into(), "bot".into(), "secret".into()]),
    )
    .await;
    assert_eq!(success(resp), Value::Int(42));
}

#[tokio::test]
async fn version_is_a_struct() {
    let app = app();
    let value = success(send(&app, xml_request("/xmlrpc/common", "version", &[])).await);
    assert!(value.as_struct().unwrap().contains_key("server_version"));
}

#[tokio::test]
async fn garbage_body_is_a_fault_with_200() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/xmlrpc/common")
        .body("not xml at all".to_string())
        .unwrap();
    assert!(matches!(send(&app, request).await, MethodResponse::Fault(_)));
}

// --- object ---

#[tokio::test]
async fn create_then_read() {
    let app = app();
    let id = success(execute(&app, "res.partner", "create", vec![partner("Agrolait")]).await);
    assert_eq!(id, Value::Int(1));

    let rows = success(
        execute(&app, "res.partner", "read", vec![Value::from(vec![1]), Value::from(vec!["name"])]).await,
    );
    let row = rows.as_array().unwrap()[0].as_struct().unwrap().clone();
    assert_eq!(row["name"], Value::from("Agrolait"));
    assert_eq!(row["id"], Value::Int(1));
}

#[tokio::test]
async fn search_with_domain_and_count() {
    let app = app();
    for name in ["a", "b", "c"] {
        success(execute(&app, "res.partner", "create", vec![partner(name)]).await);
    }
    let domain = Value::from(vec![Value::from(vec![
        Value::from("name"),
        Value::from("!="),
        Value::from("b"),
    ])]);

    let ids = success(execute(&app, "res.partner", "search", vec![domain.clone()]).await);
    assert_eq!(ids, Value::from(vec![1, 3]));

    let count = success(
        execute(
            &app,
            "res.partner",
            "search",
            vec![domain, Value::Int(0), Value::Int(0), Value::Nil, Value::Nil, Value::Bool(true)],
        )
        .await,
    );
    assert_eq!(count, Value::Int(2));
}

#[tokio::test]
async fn write_and_unlink() {
    let app = app();
    success(execute(&app, "res.partner", "create", vec![partner("old")]).await);

    let ok = success(execute(&app, "res.partner", "write", vec![Value::from(vec![1]), partner("new")]).await);
    assert_eq!(ok, Value::Bool(true));

    let ok = success(execute(&app, "res.partner", "unlink", vec![Value::from(vec![1])]).await);
    assert_eq!(ok, Value::Bool(true));

    let rows = success(execute(&app, "res.partner", "read", vec![Value::from(vec![1])]).await);
    assert_eq!(rows, Value::Array(vec![]));
}

#[tokio::test]
async fn write_missing_record_is_a_fault() {
    let app = app();
    let resp = execute(&app, "res.partner", "write", vec![Value::from(vec![9]), partner("x")]).await;
    match resp {
        MethodResponse::Fault(fault) => assert_eq!(fault.code, "MissingError"),
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn execute_with_wrong_uid_is_access_denied() {
    let app = app();
    let params = vec![
        "demo".into(),
        Value::Int(5),
        "admin".into(),
        "res.partner".into(),
        "search".into(),
        Value::Array(vec![]),
    ];
    match send(&app, xml_request("/xmlrpc/object", "execute", &params)).await {
        MethodResponse::Fault(fault) => assert_eq!(fault.code, "AccessDenied"),
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = app();
    let resp = app
        .oneshot(Request::builder().uri("/xmlrpc/db").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
