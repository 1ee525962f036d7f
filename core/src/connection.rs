//! Blocking OpenERP client: `ObjectClient` plus a `Transport`.
//!
//! # Design
//! Each operation builds its request, hands it to the transport, and parses
//! the response, all on the calling thread. Failures are logged at `debug`
//! with the model and remote method, then returned to the caller; nothing is
//! swallowed. A `Connection` only exists after a successful login, so every
//! object call carries a valid session.

use oerp_xmlrpc::Value;
use tracing::debug;

use crate::client::ObjectClient;
use crate::error::OerpError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::{ConnectOptions, Session};
use crate::transport::Transport;
use crate::types::{Context, DomainTerm, Record, RecordId, SearchParams, SearchResult, Values};

/// An authenticated connection to one OpenERP database.
#[derive(Debug, Clone)]
pub struct Connection<T> {
    client: ObjectClient,
    transport: T,
}

impl<T: Transport> Connection<T> {
    /// Log in and bind the session to the object endpoint.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` for an unusable host/port, `AuthenticationFailed`
    /// when the server does not return a user id, and transport, HTTP,
    /// fault or decode errors from the login call itself.
    pub fn connect(transport: T, options: ConnectOptions) -> Result<Self, OerpError> {
        let database = options.database.clone();
        let username = options.username.clone();
        let result = ObjectClient::build_login(&options)
            .and_then(|request| Ok(transport.execute(request)?))
            .and_then(|response| ObjectClient::parse_login(options, response));

        match result {
            Ok(client) => {
                debug!(%database, %username, uid = client.session().uid(), "logged in");
                Ok(Self { client, transport })
            }
            Err(e) => {
                debug!(%database, %username, error = %e, "login failed");
                Err(e)
            }
        }
    }

    pub fn connect_with(
        transport: T,
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, OerpError> {
        Self::connect(transport, ConnectOptions::new(host, port, database, username, password))
    }

    /// Whether a login with these options succeeds. The session is discarded.
    pub fn test_connection(transport: T, options: ConnectOptions) -> bool {
        Self::connect(transport, options).is_ok()
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn client(&self) -> &ObjectClient {
        &self.client
    }

    /// Create a record and return its id.
    pub fn create(&self, model: &str, values: &Values, context: Option<&Context>) -> Result<RecordId, OerpError> {
        let request = self.client.build_create(model, values, context);
        self.round_trip(model, "create", request)
            .and_then(|response| self.client.parse_create(response))
            .inspect_err(|e| log_failure(model, "create", e))
    }

    /// Search for ids, or count matches when `params.count` is set.
    pub fn search(&self, model: &str, params: &SearchParams) -> Result<SearchResult, OerpError> {
        let request = self.client.build_search(model, params);
        self.round_trip(model, "search", request)
            .and_then(|response| self.client.parse_search(params, response))
            .inspect_err(|e| log_failure(model, "search", e))
    }

    /// Ids matching `domain` with default offset, limit and ordering.
    pub fn search_ids(&self, model: &str, domain: &[DomainTerm]) -> Result<Vec<RecordId>, OerpError> {
        let params = SearchParams::new(domain.to_vec());
        match self.search(model, &params)? {
            SearchResult::Ids(ids) => Ok(ids),
            SearchResult::Count(n) => Err(OerpError::unexpected("array of ids", n.to_string())),
        }
    }

    /// Number of records matching `domain`.
    pub fn search_count(&self, model: &str, domain: &[DomainTerm]) -> Result<usize, OerpError> {
        let params = SearchParams::new(domain.to_vec()).count(true);
        Ok(self.search(model, &params)?.len())
    }

    /// Read `fields` (all fields when empty) of the given records, in `ids` order.
    pub fn read(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>, OerpError> {
        let request = self.client.build_read(model, ids, fields);
        self.round_trip(model, "read", request)
            .and_then(|response| self.client.parse_read(ids, response))
            .inspect_err(|e| log_failure(model, "read", e))
    }

    /// Update records. `Ok(false)` is the server's own answer, not a failure.
    pub fn write(
        &self,
        model: &str,
        ids: &[RecordId],
        values: &Values,
        context: Option<&Context>,
    ) -> Result<bool, OerpError> {
        let request = self.client.build_write(model, ids, values, context);
        self.round_trip(model, "write", request)
            .and_then(|response| self.client.parse_write(response))
            .inspect_err(|e| log_failure(model, "write", e))
    }

    /// Delete records.
    pub fn unlink(&self, model: &str, ids: &[RecordId]) -> Result<bool, OerpError> {
        let request = self.client.build_unlink(model, ids);
        self.round_trip(model, "unlink", request)
            .and_then(|response| self.client.parse_unlink(response))
            .inspect_err(|e| log_failure(model, "unlink", e))
    }

    /// Call any model method not wrapped above.
    pub fn call(&self, model: &str, method: &str, args: Vec<Value>) -> Result<Value, OerpError> {
        let request = self.client.build_call(model, method, args);
        self.round_trip(model, method, request)
            .and_then(|response| self.client.parse_call(response))
            .inspect_err(|e| log_failure(model, method, e))
    }

    fn round_trip(&self, model: &str, method: &str, request: HttpRequest) -> Result<HttpResponse, OerpError> {
        debug!(model, method, url = %request.url, "object call");
        Ok(self.transport.execute(request)?)
    }
}

fn log_failure(model: &str, method: &str, error: &OerpError) {
    debug!(model, method, %error, "object call failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use oerp_xmlrpc::{decode_call, encode_response};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn options() -> ConnectOptions {
        ConnectOptions::new("localhost", 8069, "demo", "admin", "admin")
    }

    /// Answers `login` with uid 1 and every `execute` with `reply`,
    /// recording the remote method names it saw.
    struct Scripted {
        reply: Value,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Transport for Scripted {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let call = decode_call(&request.body).unwrap();
            if call.method_name == "login" {
                return Ok(HttpResponse::ok(encode_response(&Value::Int(1))));
            }
            let method = call.params[4].as_str().unwrap().to_string();
            self.seen.borrow_mut().push(method);
            Ok(HttpResponse::ok(encode_response(&self.reply)))
        }
    }

    fn scripted(reply: Value) -> (Scripted, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let transport = Scripted {
            reply,
            seen: Rc::clone(&seen),
        };
        (transport, seen)
    }

    #[test]
    fn connect_with_refused_transport_fails() {
        let refused = |_: HttpRequest| -> Result<HttpResponse, TransportError> {
            Err(TransportError::new("connection refused"))
        };
        let err = Connection::connect(refused, options()).err().unwrap();
        assert!(matches!(err, OerpError::Transport(_)));
        assert!(!Connection::test_connection(refused, options()));
    }

    #[test]
    fn connect_with_bad_address_never_calls_transport() {
        let panicking = |_: HttpRequest| -> Result<HttpResponse, TransportError> {
            panic!("transport must not be called")
        };
        let err = Connection::connect_with(panicking, "", 8069, "demo", "admin", "admin").err().unwrap();
        assert!(matches!(err, OerpError::InvalidAddress(_)));
    }

    #[test]
    fn bad_credentials_give_no_connection() {
        let deny = |_: HttpRequest| -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::ok(encode_response(&Value::Bool(false))))
        };
        let err = Connection::connect(deny, options()).err().unwrap();
        assert!(matches!(err, OerpError::AuthenticationFailed { .. }));
    }

    #[test]
    fn operations_use_execute_with_method_name() {
        let (transport, seen) = scripted(Value::Bool(true));
        let conn = Connection::connect(transport, options()).unwrap();
        assert!(conn.write("res.partner", &[1], &Values::new(), None).unwrap());
        assert!(conn.unlink("res.partner", &[1]).unwrap());
        assert_eq!(conn.call("res.partner", "check_access", vec![]).unwrap(), Value::Bool(true));
        assert_eq!(*seen.borrow(), vec!["write", "unlink", "check_access"]);
    }

    #[test]
    fn search_count_and_ids_helpers() {
        let (transport, _) = scripted(Value::Int(5));
        let conn = Connection::connect(transport, options()).unwrap();
        assert_eq!(conn.search_count("res.partner", &[]).unwrap(), 5);

        let (transport, _) = scripted(Value::from(vec![4, 5]));
        let conn = Connection::connect(transport, options()).unwrap();
        assert_eq!(conn.search_ids("res.partner", &[]).unwrap(), vec![4, 5]);
    }

    #[test]
    fn wrong_response_type_is_an_error_not_false() {
        let (transport, _) = scripted(Value::Nil);
        let conn = Connection::connect(transport, options()).unwrap();
        let err = conn.write("res.partner", &[1], &Values::new(), None).unwrap_err();
        assert!(matches!(err, OerpError::UnexpectedResponse { .. }));
    }
}
