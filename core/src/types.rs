//! Domain types for OpenERP object calls.
//!
//! # Design
//! Records come back from `read` as untyped field maps; `Record` wraps that
//! map with accessors that know OpenERP's conventions (`false` for an empty
//! field, `[id, display_name]` for many2one). Domains are kept as data and
//! forwarded verbatim: the client never evaluates them.

use std::collections::BTreeMap;

use oerp_xmlrpc::Value;
use serde::de::DeserializeOwned;

use crate::error::FieldError;

/// Identifier of a record within one model.
pub type RecordId = i32;

/// Field values sent to `create` / `write`.
pub type Values = BTreeMap<String, Value>;

/// Side-channel options such as `lang` or `tz`.
pub type Context = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One record as returned by `read`: field name to value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// The record's own `id` field, if present and in range.
    pub fn id(&self) -> Option<RecordId> {
        self.0
            .get("id")
            .and_then(Value::as_i64)
            .and_then(|id| RecordId::try_from(id).ok())
    }

    fn require(&self, field: &str) -> Result<&Value, FieldError> {
        self.0
            .get(field)
            .ok_or_else(|| FieldError::Missing(field.to_string()))
    }

    pub fn get_str(&self, field: &str) -> Result<&str, FieldError> {
        let value = self.require(field)?;
        value.as_str().ok_or_else(|| type_error(field, "string", value))
    }

    /// Like `get_str`, but OpenERP's `false` (and `nil`) read as `None`.
    pub fn opt_str(&self, field: &str) -> Result<Option<&str>, FieldError> {
        match self.require(field)? {
            Value::Bool(false) | Value::Nil => Ok(None),
            value => value
                .as_str()
                .map(Some)
                .ok_or_else(|| type_error(field, "string", value)),
        }
    }

    pub fn get_i64(&self, field: &str) -> Result<i64, FieldError> {
        let value = self.require(field)?;
        value.as_i64().ok_or_else(|| type_error(field, "int", value))
    }

    pub fn get_f64(&self, field: &str) -> Result<f64, FieldError> {
        let value = self.require(field)?;
        value.as_f64().ok_or_else(|| type_error(field, "double", value))
    }

    pub fn get_bool(&self, field: &str) -> Result<bool, FieldError> {
        let value = self.require(field)?;
        value.as_bool().ok_or_else(|| type_error(field, "boolean", value))
    }

    /// A many2one field: `[id, display_name]`, or `None` when unset.
    pub fn get_many2one(&self, field: &str) -> Result<Option<(RecordId, &str)>, FieldError> {
        let value = self.require(field)?;
        match value {
            Value::Bool(false) | Value::Nil => Ok(None),
            Value::Array(pair) => match pair.as_slice() {
                [Value::Int(id), name] => {
                    let id = RecordId::try_from(*id)
                        .map_err(|_| type_error(field, "many2one", value))?;
                    let name = name.as_str().unwrap_or_default();
                    Ok(Some((id, name)))
                }
                _ => Err(type_error(field, "many2one", value)),
            },
            _ => Err(type_error(field, "many2one", value)),
        }
    }

    /// A one2many / many2many field: a list of ids.
    pub fn get_ids(&self, field: &str) -> Result<Vec<RecordId>, FieldError> {
        let value = self.require(field)?;
        let items = value
            .as_array()
            .ok_or_else(|| type_error(field, "array of ids", value))?;
        items
            .iter()
            .map(|item| {
                item.as_i64()
                    .and_then(|id| RecordId::try_from(id).ok())
                    .ok_or_else(|| type_error(field, "array of ids", value))
            })
            .collect()
    }

    /// Deserialize the whole record through serde.
    ///
    /// Goes through `serde_json::Value`, so `DateTime` fields arrive as
    /// strings and `Base64` fields as base64 text.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let json = serde_json::Value::from(Value::Struct(self.0.clone()));
        serde_json::from_value(json)
    }
}

fn type_error(field: &str, expected: &'static str, found: &Value) -> FieldError {
    FieldError::Type {
        field: field.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// One element of a search domain in OpenERP's prefix notation.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainTerm {
    /// `(field, operator, value)`, sent as a three-element array.
    Condition {
        field: String,
        operator: String,
        value: Value,
    },
    /// `'&'`: both of the next two expressions.
    And,
    /// `'|'`: either of the next two expressions.
    Or,
    /// `'!'`: negation of the next expression.
    Not,
}

impl DomainTerm {
    pub fn condition(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        DomainTerm::Condition {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            DomainTerm::Condition {
                field,
                operator,
                value,
            } => Value::Array(vec![
                Value::String(field.clone()),
                Value::String(operator.clone()),
                value.clone(),
            ]),
            DomainTerm::And => Value::from("&"),
            DomainTerm::Or => Value::from("|"),
            DomainTerm::Not => Value::from("!"),
        }
    }
}

/// Encode a domain as the XML-RPC array OpenERP expects.
pub fn domain_value(domain: &[DomainTerm]) -> Value {
    Value::Array(domain.iter().map(DomainTerm::to_value).collect())
}

/// Decode a domain from JSON (`[["name", "ilike", "a"], "|", ...]`).
///
/// Used at the C boundary where domains arrive as text.
pub fn domain_from_json(json: serde_json::Value) -> Option<Vec<DomainTerm>> {
    let serde_json::Value::Array(items) = json else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(op) => match op.as_str() {
                "&" => Some(DomainTerm::And),
                "|" => Some(DomainTerm::Or),
                "!" => Some(DomainTerm::Not),
                _ => None,
            },
            serde_json::Value::Array(mut triple) if triple.len() == 3 => {
                let value = Value::from(triple.pop()?);
                let operator = triple.pop()?.as_str()?.to_string();
                let field = triple.pop()?.as_str()?.to_string();
                Some(DomainTerm::Condition {
                    field,
                    operator,
                    value,
                })
            }
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Parameters for `search`. `Default` gives: no conditions, offset 0,
/// limit 0 (no limit), server ordering, no reversal, ids rather than a count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub domain: Vec<DomainTerm>,
    pub offset: u32,
    pub limit: u32,
    pub order: Option<String>,
    pub reverse: bool,
    pub count: bool,
}

impl SearchParams {
    pub fn new(domain: Vec<DomainTerm>) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }
}

/// What `search` returns: a match count, or the matching ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Count(usize),
    Ids(Vec<RecordId>),
}

impl SearchResult {
    pub fn ids(&self) -> Option<&[RecordId]> {
        match self {
            SearchResult::Ids(ids) => Some(ids),
            SearchResult::Count(_) => None,
        }
    }

    pub fn into_ids(self) -> Option<Vec<RecordId>> {
        match self {
            SearchResult::Ids(ids) => Some(ids),
            SearchResult::Count(_) => None,
        }
    }

    /// Number of matches, whichever form the result has.
    pub fn len(&self) -> usize {
        match self {
            SearchResult::Count(n) => *n,
            SearchResult::Ids(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
