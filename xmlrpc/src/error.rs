//! Error types for the XML-RPC codec.

use thiserror::Error;

/// Errors produced while decoding an XML-RPC document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlRpcError {
    /// The input is not well-formed XML.
    #[error("invalid XML: {0}")]
    Xml(String),

    /// The XML is well-formed but does not follow the XML-RPC grammar.
    #[error("malformed XML-RPC document: {0}")]
    Malformed(String),

    /// A `<base64>` payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

impl XmlRpcError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        XmlRpcError::Malformed(msg.into())
    }
}
