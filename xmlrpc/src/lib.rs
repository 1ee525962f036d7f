//! XML-RPC value model and wire codec.
//!
//! # Overview
//! Encodes `methodCall` / `methodResponse` documents and decodes them back
//! into [`Value`] trees. Both sides of the conversation live here so the
//! client core and the mock server speak exactly the same dialect.
//!
//! # Design
//! - Pure functions over `&str` / `String`; no I/O, no HTTP.
//! - Decoding goes through a small element tree built with `quick-xml`, then
//!   the tree is interpreted. Whitespace between structural elements is
//!   ignored, whitespace inside `<string>` is preserved.
//! - The `<nil/>` extension is supported in both directions because OpenERP
//!   servers run with `allow_none`. `<i8>` is accepted on input; integers
//!   outside the `i32` range are written as `<i8>`.

pub mod decode;
pub mod encode;
pub mod error;
pub mod value;

pub use decode::{decode_call, decode_response};
pub use encode::{encode_call, encode_fault, encode_response};
pub use error::XmlRpcError;
pub use value::{Fault, MethodCall, MethodResponse, Value};
