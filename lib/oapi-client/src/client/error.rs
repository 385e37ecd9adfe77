use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when using the [`ApiClient`](super::ApiClient).
///
/// The three kinds raised by a call that reached the authorization step or the
/// transport are [`Unauthorized`](Self::Unauthorized), [`Client`](Self::Client)
/// and [`Timeout`](Self::Timeout). Branch on them with a `match` to decide
/// whether to retry, prompt for re-authentication, or surface a message.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiClientError {
    /// No usable access token could be obtained for the request.
    Unauthorized(UnauthorizedError),

    /// The transport call failed with an HTTP error or a non-timeout network error.
    Client(ClientError),

    /// The transport call timed out.
    Timeout(ClientTimeoutError),

    /// URL parsing error when validating the base URL.
    UrlError(url::ParseError),

    /// Invalid HTTP header value.
    ///
    /// Occurs when the user agent, app version or a token contains invalid characters.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization error while building operation options.
    JsonValueError(serde_json::Error),

    /// The client was built without a base URL.
    #[display("A `base_url` must be given")]
    MissingBaseUrl,

    /// The endpoint template still contains placeholders after substitution.
    #[display("Missing required path parameter(s): {} <{endpoint}>", missings.join(", "))]
    #[from(skip)]
    MissingPathParameters {
        /// The endpoint template with the resolved parameters substituted.
        endpoint: String,
        /// Names of the unresolved placeholders, in order of appearance.
        missings: Vec<String>,
    },

    /// No operation is registered under this identifier.
    #[display("Unknown operation: {id}")]
    #[from(skip)]
    UnknownOperation {
        /// The requested operation identifier.
        id: String,
    },

    /// The response payload could not be decoded into the requested type.
    #[display("Failed to deserialize JSON at '{path}': {error}\n{body}")]
    #[from(skip)]
    JsonError {
        /// The JSON path where decoding failed.
        path: String,
        /// The underlying JSON parsing error.
        error: serde_json::Error,
        /// The response body that failed to decode.
        body: String,
    },

    /// Client settings or an operations document could not be parsed.
    #[display("Invalid settings: {message}")]
    #[from(skip)]
    SettingsError {
        /// Description of the parsing failure.
        message: String,
    },
}

impl ApiClientError {
    /// The HTTP status carried by this error, if any.
    ///
    /// [`Unauthorized`](Self::Unauthorized) always reports `401`.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(UnauthorizedError::STATUS_CODE),
            Self::Client(error) => error.status_code,
            _ => None,
        }
    }
}

/// Raised by the token authority when authorization is required but unobtainable.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
#[display("{message} <{url}>")]
pub struct UnauthorizedError {
    message: String,
    url: String,
}

impl UnauthorizedError {
    /// HTTP status associated with every authorization failure.
    pub const STATUS_CODE: u16 = 401;

    pub(crate) fn new(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            url: url.into(),
        }
    }

    /// The unmet precondition.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The URL that was being accessed.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Machine-readable code of a normalized failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorCode {
    /// Status in the 5xx range.
    #[display("EHTTPSERVER")]
    HttpServer,
    /// Any other non-timeout failure.
    #[display("EHTTPCLIENT")]
    HttpClient,
}

/// A field-level validation failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The offending property.
    pub property: String,
    /// The violated constraint.
    pub constraint: String,
    /// Human readable description.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.message, self.property, self.constraint)
    }
}

/// A normalized non-timeout transport failure.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error)]
pub struct ClientError {
    status_code: Option<u16>,
    message: String,
    problem_type: Option<String>,
    errors: Vec<ValidationError>,
    detail: Option<String>,
}

impl ClientError {
    pub(crate) fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            problem_type: None,
            errors: Vec::new(),
            detail: None,
        }
    }

    pub(crate) fn with_problem_type(mut self, problem_type: Option<String>) -> Self {
        self.problem_type = problem_type;
        self
    }

    pub(crate) fn with_errors(mut self, errors: Vec<ValidationError>) -> Self {
        self.errors = errors;
        self
    }

    pub(crate) fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    /// The HTTP status, when the failure carried one.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Server failures for 5xx statuses, client failures otherwise.
    pub fn code(&self) -> ErrorCode {
        match self.status_code {
            Some(status) if status >= 500 => ErrorCode::HttpServer,
            _ => ErrorCode::HttpClient,
        }
    }

    /// The message without the validation details.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The problem type URI reported by the server.
    pub fn problem_type(&self) -> Option<&str> {
        self.problem_type.as_deref()
    }

    /// The structured validation errors reported by the server.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// The problem detail reported by the server.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if !self.errors.is_empty() {
            let details = self
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " {details}")?;
        }
        Ok(())
    }
}

/// Transport codes recognized as timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TimeoutCode {
    /// The request was aborted by the client-side timeout.
    #[display("ECONNABORTED")]
    ConnectionAborted,
    /// The connection timed out.
    #[display("ETIMEDOUT")]
    TimedOut,
}

/// A transport call that exceeded its timeout.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
#[display("{message}")]
pub struct ClientTimeoutError {
    code: TimeoutCode,
    message: String,
}

impl ClientTimeoutError {
    pub(crate) fn new(code: TimeoutCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Which timeout was hit.
    pub fn code(&self) -> TimeoutCode {
        self.code
    }
}
