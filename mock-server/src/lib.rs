//! In-memory OpenERP XML-RPC server for tests and local development.
//!
//! Serves `POST /xmlrpc/common` (`login`, `version`) and
//! `POST /xmlrpc/object` (`execute` with `create`, `search`,
//! `search_count`, `read`, `write`, `unlink`). Every request is answered
//! with HTTP 200 and an XML-RPC body; errors travel as `<fault>`, the way a
//! real OpenERP server reports them.

pub mod store;

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use oerp_xmlrpc::{decode_call, encode_fault, encode_response, Fault, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, warn};

use store::{Fields, Store};

/// A user the mock server accepts.
#[derive(Debug, Clone)]
pub struct MockUser {
    pub uid: i64,
    pub login: String,
    pub password: String,
}

/// Database name and users of a mock server instance.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub database: String,
    pub users: Vec<MockUser>,
}

impl Default for MockConfig {
    /// Database `demo` with `admin`/`admin` (uid 1) and `demo`/`demo` (uid 5).
    fn default() -> Self {
        let user = |uid, login: &str, password: &str| MockUser {
            uid,
            login: login.to_string(),
            password: password.to_string(),
        };
        Self {
            database: "demo".to_string(),
            users: vec![user(1, "admin", "admin"), user(5, "demo", "demo")],
        }
    }
}

struct AppState {
    config: MockConfig,
    store: RwLock<Store>,
}

type SharedState = Arc<AppState>;

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state: SharedState = Arc::new(AppState {
        config,
        store: RwLock::new(Store::default()),
    });
    Router::new()
        .route("/xmlrpc/common", post(common))
        .route("/xmlrpc/object", post(object))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn common(State(state): State<SharedState>, body: String) -> Response {
    xml_reply(handle_common(&state.config, &body))
}

async fn object(State(state): State<SharedState>, body: String) -> Response {
    let result = match decode_call(&body) {
        Ok(call) if call.method_name == "execute" => {
            let mut store = state.store.write().await;
            execute(&state.config, &mut store, call.params)
        }
        Ok(call) => Err(unsupported(&call.method_name)),
        Err(e) => Err(Fault::new("1", e.to_string())),
    };
    xml_reply(result)
}

fn xml_reply(result: Result<Value, Fault>) -> Response {
    let body = match result {
        Ok(value) => encode_response(&value),
        Err(fault) => {
            warn!(code = %fault.code, message = %fault.message, "answering with fault");
            encode_fault(&fault)
        }
    };
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn unsupported(method: &str) -> Fault {
    Fault::new("1", format!("method {method:?} is not supported"))
}

fn handle_common(config: &MockConfig, body: &str) -> Result<Value, Fault> {
    let call = decode_call(body).map_err(|e| Fault::new("1", e.to_string()))?;
    match call.method_name.as_str() {
        "login" => {
            let [db, login, password] = call.params.as_slice() else {
                return Err(Fault::new("1", "login takes (db, login, password)"));
            };
            let uid = config
                .users
                .iter()
                .find(|u| {
                    db.as_str() == Some(config.database.as_str())
                        && login.as_str() == Some(u.login.as_str())
                        && password.as_str() == Some(u.password.as_str())
                })
                .map(|u| u.uid);
            debug!(login = ?login.as_str(), ?uid, "login");
            Ok(uid.map_or(Value::Bool(false), Value::Int))
        }
        "version" => {
            let members = [("server_version".to_string(), Value::from("6.0"))]
                .into_iter()
                .collect();
            Ok(Value::Struct(members))
        }
        other => Err(unsupported(other)),
    }
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

fn bad_arg(msg: impl Into<String>) -> Fault {
    Fault::new("TypeError", msg.into())
}

/// `args[i]`, treating `nil` like an omitted argument.
fn arg(args: &[Value], i: usize) -> Option<&Value> {
    args.get(i).filter(|v| !v.is_nil())
}

fn str_arg<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a str, Fault> {
    arg(args, i)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_arg(format!("{name} must be a string")))
}

fn struct_arg(args: &[Value], i: usize, name: &str) -> Result<Fields, Fault> {
    match arg(args, i) {
        Some(Value::Struct(fields)) => Ok(fields.clone()),
        _ => Err(bad_arg(format!("{name} must be a struct"))),
    }
}

fn usize_arg(args: &[Value], i: usize, name: &str) -> Result<usize, Fault> {
    match arg(args, i) {
        None | Some(Value::Bool(false)) => Ok(0),
        Some(v) => v
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| bad_arg(format!("{name} must be a non-negative integer"))),
    }
}

/// A single id is accepted where a list is expected.
fn ids_arg(args: &[Value], i: usize) -> Result<Vec<i64>, Fault> {
    match arg(args, i) {
        Some(Value::Int(id)) => Ok(vec![*id]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_i64().ok_or_else(|| bad_arg("ids must be integers")))
            .collect(),
        _ => Err(bad_arg("ids must be a list of integers")),
    }
}

fn domain_arg(args: &[Value], i: usize) -> Result<&[Value], Fault> {
    match arg(args, i) {
        None => Ok(&[]),
        Some(v) => v.as_array().ok_or_else(|| bad_arg("domain must be a list")),
    }
}

fn execute(config: &MockConfig, store: &mut Store, params: Vec<Value>) -> Result<Value, Fault> {
    let database = str_arg(&params, 0, "database")?;
    let uid = arg(&params, 1).and_then(Value::as_i64);
    let password = str_arg(&params, 2, "password")?;
    let authenticated = database == config.database
        && config
            .users
            .iter()
            .any(|u| Some(u.uid) == uid && u.password == password);
    if !authenticated {
        return Err(Fault::new("AccessDenied", "Access denied"));
    }

    let model = str_arg(&params, 3, "model")?;
    let method = str_arg(&params, 4, "method")?;
    let args = &params[5..];
    debug!(model, method, args = args.len(), "execute");

    match method {
        "create" => {
            let values = struct_arg(args, 0, "values")?;
            Ok(Value::Int(store.create(model, values)))
        }
        "search" => {
            let domain = domain_arg(args, 0)?;
            let offset = usize_arg(args, 1, "offset")?;
            let limit = usize_arg(args, 2, "limit")?;
            let order = arg(args, 3).and_then(Value::as_str);
            let count = arg(args, 5).and_then(Value::as_bool).unwrap_or(false);
            if count {
                let n = store.count(model, domain)?;
                return Ok(Value::Int(n as i64));
            }
            let ids = store.search(model, domain, offset, limit, order)?;
            Ok(Value::from(ids))
        }
        "search_count" => {
            let n = store.count(model, domain_arg(args, 0)?)?;
            Ok(Value::Int(n as i64))
        }
        "read" => {
            let ids = ids_arg(args, 0)?;
            let fields: Vec<String> = match arg(args, 1) {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|f| f.as_str().map(str::to_string).ok_or_else(|| bad_arg("fields must be strings")))
                    .collect::<Result<_, _>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(store.read(model, &ids, &fields)))
        }
        "write" => {
            let ids = ids_arg(args, 0)?;
            let values = struct_arg(args, 1, "values")?;
            store.write(model, &ids, values)?;
            Ok(Value::Bool(true))
        }
        "unlink" => {
            store.unlink(model, &ids_arg(args, 0)?);
            Ok(Value::Bool(true))
        }
        other => Err(Fault::new(
            "AttributeError",
            format!("'{model}' object has no attribute '{other}'"),
        )),
    }
}
