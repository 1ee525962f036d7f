//! In-memory model tables with OpenERP-style domain filtering.
//!
//! Rows are schemaless field maps keyed by id. Unknown fields read as
//! `false`, the way OpenERP reports an empty column.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use oerp_xmlrpc::{Fault, Value};

pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Fields>,
}

/// All model tables of one database.
#[derive(Debug, Default)]
pub struct Store {
    tables: HashMap<String, Table>,
}

impl Store {
    pub fn create(&mut self, model: &str, mut values: Fields) -> i64 {
        let table = self.tables.entry(model.to_string()).or_default();
        table.last_id += 1;
        let id = table.last_id;
        values.insert("id".to_string(), Value::Int(id));
        table.rows.insert(id, values);
        id
    }

    /// Ids matching `domain`, sorted by `order` (default `id`), then paged.
    /// A `limit` of zero means no limit.
    pub fn search(
        &self,
        model: &str,
        domain: &[Value],
        offset: usize,
        limit: usize,
        order: Option<&str>,
    ) -> Result<Vec<i64>, Fault> {
        let mut rows = self.matching(model, domain)?;
        let keys = parse_order(order.unwrap_or("id"))?;
        rows.sort_by(|a, b| compare_rows(a, b, &keys));

        let limit = if limit == 0 { usize::MAX } else { limit };
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(row_id)
            .collect())
    }

    pub fn count(&self, model: &str, domain: &[Value]) -> Result<usize, Fault> {
        Ok(self.matching(model, domain)?.len())
    }

    /// Rows for `ids` that exist, in id order. Empty `fields` returns every
    /// field; `id` is always included.
    pub fn read(&self, model: &str, ids: &[i64], fields: &[String]) -> Vec<Value> {
        let Some(table) = self.tables.get(model) else {
            return Vec::new();
        };
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        ids.iter()
            .filter_map(|id| table.rows.get(id))
            .map(|row| {
                if fields.is_empty() {
                    return Value::Struct(row.clone());
                }
                let mut out = Fields::new();
                out.insert("id".to_string(), row["id"].clone());
                for field in fields {
                    let value = row.get(field).cloned().unwrap_or(Value::Bool(false));
                    out.insert(field.clone(), value);
                }
                Value::Struct(out)
            })
            .collect()
    }

    pub fn write(&mut self, model: &str, ids: &[i64], mut values: Fields) -> Result<(), Fault> {
        values.remove("id");
        let table = self.tables.entry(model.to_string()).or_default();
        if let Some(missing) = ids.iter().find(|id| !table.rows.contains_key(*id)) {
            return Err(Fault::new(
                "MissingError",
                format!("Record {missing} of {model} does not exist or has been deleted"),
            ));
        }
        for id in ids {
            if let Some(row) = table.rows.get_mut(id) {
                row.extend(values.clone());
            }
        }
        Ok(())
    }

    pub fn unlink(&mut self, model: &str, ids: &[i64]) {
        if let Some(table) = self.tables.get_mut(model) {
            for id in ids {
                table.rows.remove(id);
            }
        }
    }

    fn matching(&self, model: &str, domain: &[Value]) -> Result<Vec<&Fields>, Fault> {
        let exprs = parse_domain(domain)?;
        let Some(table) = self.tables.get(model) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .values()
            .filter(|row| exprs.iter().all(|e| e.eval(row)))
            .collect())
    }
}

fn row_id(row: &Fields) -> i64 {
    row.get("id").and_then(Value::as_i64).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Like,
    ILike,
}

impl Op {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "=" | "==" => Op::Eq,
            "!=" | "<>" => Op::Ne,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "in" => Op::In,
            "not in" => Op::NotIn,
            "like" => Op::Like,
            "ilike" => Op::ILike,
            _ => return None,
        })
    }
}

#[derive(Debug)]
enum Expr {
    Leaf { field: String, op: Op, value: Value },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

fn invalid_domain(msg: impl Into<String>) -> Fault {
    Fault::new("ValueError", format!("Invalid domain: {}", msg.into()))
}

/// Top-level expressions are implicitly and-ed.
fn parse_domain(domain: &[Value]) -> Result<Vec<Expr>, Fault> {
    let mut terms = domain.iter();
    let mut exprs = Vec::new();
    while terms.len() > 0 {
        exprs.push(parse_expr(&mut terms)?);
    }
    Ok(exprs)
}

fn parse_expr(terms: &mut std::slice::Iter<'_, Value>) -> Result<Expr, Fault> {
    let term = terms
        .next()
        .ok_or_else(|| invalid_domain("operator is missing an operand"))?;
    match term {
        Value::String(op) => match op.as_str() {
            "&" => Ok(Expr::And(Box::new(parse_expr(terms)?), Box::new(parse_expr(terms)?))),
            "|" => Ok(Expr::Or(Box::new(parse_expr(terms)?), Box::new(parse_expr(terms)?))),
            "!" => Ok(Expr::Not(Box::new(parse_expr(terms)?))),
            other => Err(invalid_domain(format!("unknown operator {other:?}"))),
        },
        Value::Array(triple) => match triple.as_slice() {
            [Value::String(field), Value::String(op), value] => Ok(Expr::Leaf {
                field: field.clone(),
                op: Op::parse(op).ok_or_else(|| invalid_domain(format!("unknown comparator {op:?}")))?,
                value: value.clone(),
            }),
            _ => Err(invalid_domain("condition is not (field, operator, value)")),
        },
        other => Err(invalid_domain(format!("unexpected term {other}"))),
    }
}

impl Expr {
    fn eval(&self, row: &Fields) -> bool {
        match self {
            Expr::And(a, b) => a.eval(row) && b.eval(row),
            Expr::Or(a, b) => a.eval(row) || b.eval(row),
            Expr::Not(a) => !a.eval(row),
            Expr::Leaf { field, op, value } => {
                let missing = Value::Bool(false);
                let actual = scalar(row.get(field).unwrap_or(&missing));
                match op {
                    Op::Eq => equal(actual, value),
                    Op::Ne => !equal(actual, value),
                    Op::Lt => compare(actual, value) == Some(Ordering::Less),
                    Op::Le => matches!(compare(actual, value), Some(Ordering::Less | Ordering::Equal)),
                    Op::Gt => compare(actual, value) == Some(Ordering::Greater),
                    Op::Ge => matches!(compare(actual, value), Some(Ordering::Greater | Ordering::Equal)),
                    Op::In => value.as_array().is_some_and(|items| items.iter().any(|v| equal(actual, v))),
                    Op::NotIn => value.as_array().is_some_and(|items| !items.iter().any(|v| equal(actual, v))),
                    Op::Like => like(actual, value, false),
                    Op::ILike => like(actual, value, true),
                }
            }
        }
    }
}

/// Many2one values compare by their id.
fn scalar(value: &Value) -> &Value {
    match value {
        Value::Array(pair) if pair.len() == 2 && matches!(pair[0], Value::Int(_)) => &pair[0],
        other => other,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal) || a == b
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x) | Value::DateTime(x), Value::String(y) | Value::DateTime(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn like(actual: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (actual.as_str(), pattern.as_str()) else {
        return false;
    };
    let needle = pattern.trim_matches('%');
    if case_insensitive {
        text.to_lowercase().contains(&needle.to_lowercase())
    } else {
        text.contains(needle)
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

fn parse_order(order: &str) -> Result<Vec<(String, bool)>, Fault> {
    order
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut words = part.split_whitespace();
            let field = words.next().unwrap_or_default().to_string();
            let descending = match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(Fault::new("ValueError", format!("Invalid order direction {other:?}")))
                }
            };
            Ok((field, descending))
        })
        .collect()
}

fn compare_rows(a: &Fields, b: &Fields, keys: &[(String, bool)]) -> Ordering {
    let missing = Value::Bool(false);
    for (field, descending) in keys {
        let x = scalar(a.get(field).unwrap_or(&missing));
        let y = scalar(b.get(field).unwrap_or(&missing));
        let ord = compare(x, y).unwrap_or(Ordering::Equal);
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    row_id(a).cmp(&row_id(b))
}
