//! Parsing of XML-RPC documents into `Value` trees.
//!
//! # Design
//! The document is first read into a minimal element tree (`Node`) with
//! `quick-xml`, then interpreted. Building the tree up front keeps the
//! grammar checks readable and costs little for the payload sizes an
//! OpenERP client sees. Element names are matched on their local part so
//! `<ex:nil/>` and `<ex:i8>` (Apache extensions) decode like their
//! unprefixed forms.

use std::collections::BTreeMap;

use base64::Engine;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XmlRpcError;
use crate::value::{Fault, MethodCall, MethodResponse, Value};

#[derive(Debug, Default)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn child(&self, name: &str) -> Result<&Node, XmlRpcError> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| XmlRpcError::malformed(format!("<{}> has no <{name}>", self.name)))
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Decode a `methodCall` document.
pub fn decode_call(xml: &str) -> Result<MethodCall, XmlRpcError> {
    let root = parse_tree(xml)?;
    expect_name(&root, "methodCall")?;
    let method_name = root.child("methodName")?.text.trim().to_string();
    if method_name.is_empty() {
        return Err(XmlRpcError::malformed("empty <methodName>"));
    }
    let params = match root.children_named("params").next() {
        Some(params) => decode_params(params)?,
        None => Vec::new(),
    };
    Ok(MethodCall {
        method_name,
        params,
    })
}

/// Decode a `methodResponse` document into a value or a fault.
pub fn decode_response(xml: &str) -> Result<MethodResponse, XmlRpcError> {
    let root = parse_tree(xml)?;
    expect_name(&root, "methodResponse")?;

    if let Some(fault) = root.children_named("fault").next() {
        return decode_fault(fault).map(MethodResponse::Fault);
    }

    let mut params = decode_params(root.child("params")?)?;
    if params.len() != 1 {
        return Err(XmlRpcError::malformed(format!(
            "expected exactly one response param, found {}",
            params.len()
        )));
    }
    Ok(MethodResponse::Success(params.remove(0)))
}

fn decode_params(params: &Node) -> Result<Vec<Value>, XmlRpcError> {
    params
        .children_named("param")
        .map(|param| decode_value(param.child("value")?))
        .collect()
}

fn decode_fault(fault: &Node) -> Result<Fault, XmlRpcError> {
    let value = decode_value(fault.child("value")?)?;
    let Value::Struct(mut members) = value else {
        return Err(XmlRpcError::malformed("fault value is not a struct"));
    };
    let code = match members.remove("faultCode") {
        Some(Value::Int(i)) => i.to_string(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Err(XmlRpcError::malformed("fault without faultCode")),
    };
    let message = match members.remove("faultString") {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    Ok(Fault { code, message })
}

fn decode_value(node: &Node) -> Result<Value, XmlRpcError> {
    // A bare <value>text</value> is a string.
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };
    if node.children.len() > 1 {
        return Err(XmlRpcError::malformed("<value> holds more than one element"));
    }

    let text = typed.text.trim();
    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| XmlRpcError::malformed(format!("invalid integer {text:?}"))),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            other => Err(XmlRpcError::malformed(format!("invalid boolean {other:?}"))),
        },
        "double" => text
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite())
            .map(Value::Double)
            .ok_or_else(|| XmlRpcError::malformed(format!("invalid double {text:?}"))),
        "string" => Ok(Value::String(typed.text.clone())),
        "dateTime.iso8601" => Ok(Value::DateTime(text.to_string())),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(Value::Base64)
                .map_err(|e| XmlRpcError::Base64(e.to_string()))
        }
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = typed.child("data")?;
            data.children_named("value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children_named("member") {
                let name = member.child("name")?.text.clone();
                let value = decode_value(member.child("value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(XmlRpcError::malformed(format!("unknown value type <{other}>"))),
    }
}

fn expect_name(node: &Node, name: &str) -> Result<(), XmlRpcError> {
    if node.name == name {
        Ok(())
    } else {
        Err(XmlRpcError::malformed(format!(
            "expected <{name}> root, found <{}>",
            node.name
        )))
    }
}

fn xml_err(e: impl std::fmt::Display) -> XmlRpcError {
    XmlRpcError::Xml(e.to_string())
}

/// Read the whole document into a `Node` tree and return its root.
fn parse_tree(xml: &str) -> Result<Node, XmlRpcError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Node::new(name));
            }
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                attach(&mut stack, &mut root, Node::new(name))?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlRpcError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let raw = text.decode().map_err(xml_err)?;
                    top.text.push_str(&unescape(&raw).map_err(xml_err)?);
                }
            }
            Event::CData(cdata) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(top) = stack.last_mut() {
                    let name = reference.decode().map_err(xml_err)?;
                    top.text.push_str(&resolve_reference(&name)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlRpcError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| XmlRpcError::Xml("empty document".to_string()))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), XmlRpcError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(XmlRpcError::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

fn resolve_reference(name: &str) -> Result<String, XmlRpcError> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => numeric.parse::<u32>(),
        }
        .map_err(|_| XmlRpcError::Xml(format!("invalid character reference &{name};")))?;
        return char::from_u32(code)
            .map(String::from)
            .ok_or_else(|| XmlRpcError::Xml(format!("invalid character reference &{name};")));
    }
    resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| XmlRpcError::Xml(format!("unknown entity &{name};")))
}
