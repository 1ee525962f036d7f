//! The seam between request building and the network.
//!
//! # Design
//! A `Transport` executes one `HttpRequest` and returns the raw
//! `HttpResponse`; status and body interpretation stay in `ObjectClient`.
//! Non-2xx statuses are therefore data, not errors. Closures implement the
//! trait so tests and embedders can plug in their own I/O.

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one blocking HTTP round-trip.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(HttpRequest) -> Result<HttpResponse, TransportError>,
{
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by `ureq`.
///
/// A fresh agent is built for every call, so no connection or cookie state
/// is shared between operations, even across threads. There is no timeout:
/// a hung server blocks the caller. Response bodies are read whole, with no
/// size limit.
#[cfg(feature = "ureq")]
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqTransport;

#[cfg(feature = "ureq")]
impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Statuses are returned as data so the client decides what 4xx/5xx mean.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();

        let mut builder = agent.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = builder
            .send(request.body.as_bytes())
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(|e| TransportError::new(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
