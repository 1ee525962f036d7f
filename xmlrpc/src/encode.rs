//! Serialization of `Value` trees into XML-RPC documents.
//!
//! Output is compact (no indentation) and always starts with an XML
//! declaration. Text is escaped with `quick_xml::escape::escape`.

use std::fmt::Write;

use base64::Engine;
use quick_xml::escape::escape;

use crate::value::{Fault, Value};

const DECLARATION: &str = r#"<?xml version="1.0"?>"#;

/// Encode a `methodCall` document.
pub fn encode_call(method_name: &str, params: &[Value]) -> String {
    let mut out = String::from(DECLARATION);
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(method_name));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Encode a successful `methodResponse` carrying one value.
pub fn encode_response(value: &Value) -> String {
    let mut out = String::from(DECLARATION);
    out.push_str("<methodResponse><params><param>");
    write_value(&mut out, value);
    out.push_str("</param></params></methodResponse>");
    out
}

/// Encode a fault `methodResponse`. Numeric codes are written as `<int>`,
/// anything else as `<string>`.
pub fn encode_fault(fault: &Fault) -> String {
    let code = match fault.code.parse::<i64>() {
        Ok(i) => Value::Int(i),
        Err(_) => Value::String(fault.code.clone()),
    };
    let members = [
        ("faultCode".to_string(), code),
        ("faultString".to_string(), Value::String(fault.message.clone())),
    ]
    .into_iter()
    .collect();

    let mut out = String::from(DECLARATION);
    out.push_str("<methodResponse><fault>");
    write_value(&mut out, &Value::Struct(members));
    out.push_str("</fault></methodResponse>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::Int(i) => {
            if i32::try_from(*i).is_ok() {
                let _ = write!(out, "<int>{i}</int>");
            } else {
                let _ = write!(out, "<i8>{i}</i8>");
            }
        }
        // NaN and infinities have no XML-RPC form.
        Value::Double(d) if !d.is_finite() => out.push_str("<nil/>"),
        Value::Double(d) => {
            let _ = write!(out, "<double>{d}</double>");
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_call_with_scalars() {
        let xml = encode_call("login", &["demo".into(), "admin".into(), Value::Int(7)]);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\"?><methodCall><methodName>login</methodName><params>\
             <param><value><string>demo</string></value></param>\
             <param><value><string>admin</string></value></param>\
             <param><value><int>7</int></value></param>\
             </params></methodCall>"
        );
    }

    #[test]
    fn encode_escapes_markup_in_strings() {
        let xml = encode_response(&Value::String("a < b & c".to_string()));
        assert!(xml.contains("<string>a &lt; b &amp; c</string>"));
    }

    #[test]
    fn encode_nil_and_bool() {
        let xml = encode_response(&Value::Array(vec![Value::Nil, Value::Bool(true)]));
        assert!(xml.contains("<array><data><value><nil/></value><value><boolean>1</boolean></value></data></array>"));
    }

    #[test]
    fn non_finite_doubles_encode_as_nil() {
        let xml = encode_response(&Value::Array(vec![
            Value::Double(f64::NAN),
            Value::Double(f64::INFINITY),
            Value::Double(-0.5),
        ]));
        assert!(xml.contains(
            "<data><value><nil/></value><value><nil/></value><value><double>-0.5</double></value></data>"
        ));
    }

    #[test]
    fn large_int_uses_i8() {
        let xml = encode_response(&Value::Int(i64::from(i32::MAX) + 1));
        assert!(xml.contains("<i8>2147483648</i8>"));
    }

    #[test]
    fn struct_members_are_sorted() {
        let members = [
            ("zeta".to_string(), Value::Int(1)),
            ("alpha".to_string(), Value::Int(2)),
        ]
        .into_iter()
        .collect();
        let xml = encode_response(&Value::Struct(members));
        let alpha = xml.find("alpha").unwrap();
        let zeta = xml.find("zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn fault_with_text_code() {
        let xml = encode_fault(&Fault::new("warning -- Access denied", "no access"));
        assert!(xml.contains("<name>faultCode</name><value><string>warning -- Access denied</string></value>"));
        assert!(xml.contains("<name>faultString</name><value><string>no access</string></value>"));
    }

    #[test]
    fn fault_with_numeric_code() {
        let xml = encode_fault(&Fault::new("1", "boom"));
        assert!(xml.contains("<int>1</int>"));
    }
}
