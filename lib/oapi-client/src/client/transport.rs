//! HTTP transport seam.
//!
//! The pipeline describes requests and responses as plain data. A
//! [`Transport`] executes a [`PreparedRequest`] and reports either a 2xx
//! [`RawResponse`] or a [`TransportFailure`]; everything else (auth, retries,
//! error normalization) happens around it.

use std::error::Error as _;
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use reqwest::Body;
use tracing::debug;

use super::path::join_url;

/// An HTTP request described as plain data.
///
/// Built once per call by the [`ApiClient`](super::ApiClient) and mutated in
/// place by the pipeline stages.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// The HTTP method.
    pub method: Method,
    /// The base URL of the API.
    pub base_url: String,
    /// The resolved endpoint, base path included.
    pub endpoint: String,
    /// The query string, already serialized by the configured serializer.
    pub query: Option<String>,
    /// Request headers, defaults included.
    pub headers: HeaderMap,
    /// JSON body.
    pub body: Option<Bytes>,
    /// Timeout applied by the transport.
    pub timeout: Option<Duration>,
    retried: bool,
}

impl PreparedRequest {
    /// Creates a request without query, body nor timeout.
    pub fn new(method: Method, base_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            retried: false,
        }
    }

    /// Base URL and endpoint joined with a single slash, without the query.
    pub fn full_url(&self) -> String {
        join_url(&self.base_url, &self.endpoint)
    }

    /// The URL sent on the wire, query included.
    pub fn url(&self) -> String {
        let url = self.full_url();
        match &self.query {
            Some(query) if !query.is_empty() => format!("{url}?{query}"),
            _ => url,
        }
    }

    /// Whether the request carries an `Authorization` header.
    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }

    /// Replaces the `Authorization` header.
    pub fn set_authorization(&mut self, value: HeaderValue) {
        self.headers.insert(AUTHORIZATION, value);
    }

    /// Whether the refresh stage already replayed this request.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// The HTTP status.
    pub status: u16,
    /// The raw body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Transport-level failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TransportCode {
    /// The connection timed out.
    #[display("ETIMEDOUT")]
    TimedOut,
    /// The request was aborted, typically by the client-side timeout.
    #[display("ECONNABORTED")]
    ConnectionAborted,
    /// The peer reset the connection.
    #[display("ECONNRESET")]
    ConnectionReset,
    /// The peer refused the connection.
    #[display("ECONNREFUSED")]
    ConnectionRefused,
}

/// A failed transport call: either an error response or a network error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// The error response, when the server answered.
    pub response: Option<RawResponse>,
    /// The transport code, when the call failed below HTTP.
    pub code: Option<TransportCode>,
    /// Fallback status when there is no response.
    pub status_code: Option<u16>,
    /// The transport's own description.
    pub message: String,
}

impl TransportFailure {
    /// A failure carrying an error response.
    pub fn from_response(response: RawResponse) -> Self {
        let message = format!("Request failed with status code {}", response.status);
        Self {
            response: Some(response),
            code: None,
            status_code: None,
            message,
        }
    }

    /// A network failure without response.
    pub fn from_code(code: Option<TransportCode>, message: impl Into<String>) -> Self {
        Self {
            response: None,
            code,
            status_code: None,
            message: message.into(),
        }
    }

    /// The response status if any, else the fallback status.
    pub fn status(&self) -> Option<u16> {
        self.response
            .as_ref()
            .map(|response| response.status)
            .or(self.status_code)
    }
}

/// Executes prepared requests.
///
/// Implementations must treat any non-2xx status as a [`TransportFailure`]
/// carrying the response.
pub trait Transport: Send + Sync {
    /// Sends `request` once.
    fn send(
        &self,
        request: &PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportFailure>> + Send;
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url())
            .headers(request.headers.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.body(Body::from(body.clone()));
        }

        debug!(method = %request.method, url = request.url(), "sending...");
        let response = builder.send().await.map_err(failure_from_reqwest)?;
        debug!(?response, "...receiving");

        let status = response.status();
        let body = response.bytes().await.map_err(failure_from_reqwest)?;
        let response = RawResponse::new(status.as_u16(), body);

        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportFailure::from_response(response))
        }
    }
}

fn failure_from_reqwest(error: reqwest::Error) -> TransportFailure {
    let code = if error.is_timeout() {
        Some(TransportCode::TimedOut)
    } else {
        io_code(&error)
    };
    let mut failure = TransportFailure::from_code(code, error.to_string());
    failure.status_code = error.status().map(|status| status.as_u16());
    failure
}

/// Looks for an I/O error in the source chain.
fn io_code(error: &reqwest::Error) -> Option<TransportCode> {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return match io_error.kind() {
                io::ErrorKind::TimedOut => Some(TransportCode::TimedOut),
                io::ErrorKind::ConnectionAborted => Some(TransportCode::ConnectionAborted),
                io::ErrorKind::ConnectionReset => Some(TransportCode::ConnectionReset),
                io::ErrorKind::ConnectionRefused => Some(TransportCode::ConnectionRefused),
                _ => None,
            };
        }
        source = cause.source();
    }
    None
}
