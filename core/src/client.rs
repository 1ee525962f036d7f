//! Stateless XML-RPC request builder and response parser for OpenERP.
//!
//! # Design
//! `ObjectClient` holds only an immutable `Session` and carries no mutable
//! state between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller executes the actual HTTP round-trip, keeping
//! the core deterministic and free of I/O dependencies.
//!
//! Every object call goes through the same remote entry point:
//! `execute(database, uid, password, model, method, args...)`.

use std::collections::{HashMap, HashSet};

use oerp_xmlrpc::{decode_response, encode_call, MethodResponse, Value};

use crate::error::OerpError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::{ConnectOptions, Session};
use crate::types::{domain_value, Context, Record, RecordId, SearchParams, SearchResult, Values};

/// Synchronous, stateless client for the OpenERP object service.
#[derive(Debug, Clone)]
pub struct ObjectClient {
    session: Session,
}

impl ObjectClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Build `login(database, username, password)` against the common endpoint.
    pub fn build_login(options: &ConnectOptions) -> Result<HttpRequest, OerpError> {
        let url = options.common_url()?;
        let body = encode_call(
            "login",
            &[
                Value::from(options.database.as_str()),
                Value::from(options.username.as_str()),
                Value::from(options.password.as_str()),
            ],
        );
        Ok(HttpRequest::xml_post(url, body))
    }

    /// Turn a `login` response into a client bound to the object endpoint.
    ///
    /// OpenERP answers `false` for bad credentials; any answer that is not a
    /// user id in `RecordId` range is reported as `AuthenticationFailed`.
    pub fn parse_login(options: ConnectOptions, response: HttpResponse) -> Result<Self, OerpError> {
        let uid = match decode(response)? {
            Value::Int(uid) => RecordId::try_from(uid).ok(),
            _ => None,
        };
        let Some(uid) = uid else {
            return Err(OerpError::AuthenticationFailed {
                database: options.database,
                username: options.username,
            });
        };
        Ok(Self::new(Session::new(options, uid)?))
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Build `execute(db, uid, password, model, method, args...)`.
    pub fn build_call(&self, model: &str, method: &str, args: Vec<Value>) -> HttpRequest {
        let mut params = Vec::with_capacity(5 + args.len());
        params.push(Value::from(self.session.database()));
        params.push(Value::from(self.session.uid()));
        params.push(Value::from(self.session.password()));
        params.push(Value::from(model));
        params.push(Value::from(method));
        params.extend(args);
        HttpRequest::xml_post(
            self.session.object_url().to_string(),
            encode_call("execute", &params),
        )
    }

    pub fn build_create(&self, model: &str, values: &Values, context: Option<&Context>) -> HttpRequest {
        self.build_call(
            model,
            "create",
            vec![Value::Struct(values.clone()), context_value(context)],
        )
    }

    /// Positional layout: `domain, offset, limit, order, context, count`.
    pub fn build_search(&self, model: &str, params: &SearchParams) -> HttpRequest {
        self.build_call(
            model,
            "search",
            vec![
                domain_value(&params.domain),
                Value::from(params.offset),
                Value::from(params.limit),
                Value::from(params.order.clone()),
                Value::Nil,
                Value::Bool(params.count),
            ],
        )
    }

    /// An empty `fields` slice asks for every field.
    pub fn build_read(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> HttpRequest {
        self.build_call(
            model,
            "read",
            vec![
                ids_value(ids),
                Value::Array(fields.iter().map(|f| Value::from(*f)).collect()),
            ],
        )
    }

    pub fn build_write(
        &self,
        model: &str,
        ids: &[RecordId],
        values: &Values,
        context: Option<&Context>,
    ) -> HttpRequest {
        self.build_call(
            model,
            "write",
            vec![ids_value(ids), Value::Struct(values.clone()), context_value(context)],
        )
    }

    pub fn build_unlink(&self, model: &str, ids: &[RecordId]) -> HttpRequest {
        self.build_call(model, "unlink", vec![ids_value(ids)])
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    pub fn parse_create(&self, response: HttpResponse) -> Result<RecordId, OerpError> {
        expect_id(decode(response)?)
    }

    /// Interpret a `search` response according to the parameters it was built with.
    pub fn parse_search(&self, params: &SearchParams, response: HttpResponse) -> Result<SearchResult, OerpError> {
        let value = decode(response)?;
        if params.count {
            let n = value
                .as_i64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| OerpError::unexpected("count", value.to_string()))?;
            return Ok(SearchResult::Count(n));
        }

        let Value::Array(items) = value else {
            return Err(OerpError::unexpected("array of ids", value.type_name()));
        };
        let mut ids = items.into_iter().map(expect_id).collect::<Result<Vec<_>, _>>()?;
        if params.reverse {
            ids.reverse();
        }
        Ok(SearchResult::Ids(ids))
    }

    /// Interpret a `read` response.
    ///
    /// The server's ordering is not relied upon: records are returned in the
    /// order of `ids`, one per requested id, so a repeated id yields its
    /// record again. Ids without a record are skipped; records with an id
    /// that was not requested, or with no `id` field, are appended in server
    /// order.
    pub fn parse_read(&self, ids: &[RecordId], response: HttpResponse) -> Result<Vec<Record>, OerpError> {
        let value = decode(response)?;
        let Value::Array(items) = value else {
            return Err(OerpError::unexpected("array of records", value.type_name()));
        };
        let records = items
            .into_iter()
            .map(|item| match item {
                Value::Struct(fields) => Ok(Record::from(fields)),
                other => Err(OerpError::unexpected("record struct", other.type_name())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(order_by_ids(ids, records))
    }

    pub fn parse_write(&self, response: HttpResponse) -> Result<bool, OerpError> {
        expect_bool(decode(response)?)
    }

    pub fn parse_unlink(&self, response: HttpResponse) -> Result<bool, OerpError> {
        expect_bool(decode(response)?)
    }

    /// The passthrough returns whatever the server sent.
    pub fn parse_call(&self, response: HttpResponse) -> Result<Value, OerpError> {
        decode(response)
    }
}

/// Check the status, decode the body, and map `<fault>` to `OerpError::Fault`.
fn decode(response: HttpResponse) -> Result<Value, OerpError> {
    if response.status != 200 {
        return Err(OerpError::Http {
            status: response.status,
            body: response.body,
        });
    }
    match decode_response(&response.body)? {
        MethodResponse::Success(value) => Ok(value),
        MethodResponse::Fault(fault) => Err(OerpError::Fault {
            code: fault.code,
            message: fault.message,
        }),
    }
}

fn expect_id(value: Value) -> Result<RecordId, OerpError> {
    match value {
        Value::Int(id) => {
            RecordId::try_from(id).map_err(|_| OerpError::unexpected("record id", id.to_string()))
        }
        other => Err(OerpError::unexpected("record id", other.type_name())),
    }
}

fn expect_bool(value: Value) -> Result<bool, OerpError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(OerpError::unexpected("boolean", other.type_name())),
    }
}

fn ids_value(ids: &[RecordId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::from(*id)).collect())
}

fn context_value(context: Option<&Context>) -> Value {
    context.map_or(Value::Nil, |c| Value::Struct(c.clone()))
}

fn order_by_ids(ids: &[RecordId], records: Vec<Record>) -> Vec<Record> {
    let requested: HashSet<RecordId> = ids.iter().copied().collect();
    let mut by_id = HashMap::new();
    let mut unrequested = Vec::new();
    for record in records {
        match record.id() {
            Some(id) if requested.contains(&id) => {
                by_id.entry(id).or_insert(record);
            }
            _ => unrequested.push(record),
        }
    }
    let mut ordered: Vec<Record> = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();
    ordered.extend(unrequested);
    ordered
}
