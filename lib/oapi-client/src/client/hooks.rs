use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::{error, warn};

use super::error::{ClientError, ClientTimeoutError};

/// What the request log hook receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// The HTTP method.
    pub method: Method,
    /// The full URL, query included.
    pub url: String,
}

type Hook<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Observability callbacks.
///
/// Each failure triggers at most one of `on_error`, `on_client_error` and
/// `on_timeout_error`. Without a callback, failures are logged with `tracing`.
#[derive(Clone, Default)]
pub struct Hooks {
    on_error: Option<Hook<ClientError>>,
    on_client_error: Option<Hook<ClientError>>,
    on_timeout_error: Option<Hook<ClientTimeoutError>>,
    on_request: Option<Hook<RequestInfo>>,
}

impl Hooks {
    /// Called for 5xx failures.
    #[must_use]
    pub fn with_on_error(mut self, hook: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Called for 4xx failures.
    #[must_use]
    pub fn with_on_client_error(
        mut self,
        hook: impl Fn(&ClientError) + Send + Sync + 'static,
    ) -> Self {
        self.on_client_error = Some(Arc::new(hook));
        self
    }

    /// Called for timeouts.
    #[must_use]
    pub fn with_on_timeout_error(
        mut self,
        hook: impl Fn(&ClientTimeoutError) + Send + Sync + 'static,
    ) -> Self {
        self.on_timeout_error = Some(Arc::new(hook));
        self
    }

    /// Called before each request is sent.
    #[must_use]
    pub fn with_on_request(mut self, hook: impl Fn(&RequestInfo) + Send + Sync + 'static) -> Self {
        self.on_request = Some(Arc::new(hook));
        self
    }

    pub(crate) fn has_on_request(&self) -> bool {
        self.on_request.is_some()
    }

    pub(crate) fn error(&self, err: &ClientError) {
        match &self.on_error {
            Some(hook) => hook(err),
            None => error!(status = ?err.status_code(), "{err}"),
        }
    }

    pub(crate) fn client_error(&self, err: &ClientError) {
        match &self.on_client_error {
            Some(hook) => hook(err),
            None => warn!(status = ?err.status_code(), "{err}"),
        }
    }

    pub(crate) fn timeout_error(&self, err: &ClientTimeoutError) {
        match &self.on_timeout_error {
            Some(hook) => hook(err),
            None => warn!(code = %err.code(), "{err}"),
        }
    }

    pub(crate) fn request(&self, info: &RequestInfo) {
        if let Some(hook) = &self.on_request {
            hook(info);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_error", &self.on_error.is_some())
            .field("on_client_error", &self.on_client_error.is_some())
            .field("on_timeout_error", &self.on_timeout_error.is_some())
            .field("on_request", &self.on_request.is_some())
            .finish()
    }
}
