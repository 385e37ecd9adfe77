use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

mod auth;
pub use self::auth::{DEFAULT_ADMIN_ROLE, SecureString, TokenFuture, TokenRetriever};

mod builder;
pub use self::builder::{ApiClientBuilder, X_APP_VERSION};

mod error;
pub use self::error::{
    ApiClientError, ClientError, ClientTimeoutError, ErrorCode, TimeoutCode, UnauthorizedError,
    ValidationError,
};

mod hooks;
pub use self::hooks::{Hooks, RequestInfo};

mod operation;
pub use self::operation::{Operation, OperationConfig, OperationOptions, Operations};

mod path;
pub use self::path::{full_path, populate_endpoint, resolve_endpoint};

mod pipeline;
pub use self::pipeline::{
    DEFAULT_REFRESH_STATUS_CODES, DEFAULT_REQUEST_TIMEOUT, MethodTimeouts, Timeout,
};

mod query;
pub use self::query::{BracketQuerySerializer, QuerySerializer, serialize_query_params};

mod settings;
pub use self::settings::ClientSettings;

mod token;

mod transport;
pub use self::transport::{
    PreparedRequest, RawResponse, ReqwestTransport, Transport, TransportCode, TransportFailure,
};

use self::auth::TokenAuthority;
use self::pipeline::Pipeline;

/// A client calling the operations of one API.
///
/// Cloning is cheap: clones share the configuration and the transport.
///
/// # Example
///
/// ```rust,no_run
/// use oapi_client::{ApiClient, OperationConfig, OperationOptions};
///
/// # async fn example() -> Result<(), oapi_client::ApiClientError> {
/// let client = ApiClient::builder()
///     .with_base_url("https://dog.ceo")
///     .with_base_path("/api")
///     .build()?;
///
/// let images = OperationConfig::new(http::Method::GET, "/breed/{breed}/images", false);
/// let options = OperationOptions::new().with_param("breed", "hound")?;
/// let payload = client.call(&images, options).await?;
/// # Ok(())
/// # }
/// ```
pub struct ApiClient<T = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T> {
    transport: T,
    base_url: String,
    base_path: Option<String>,
    headers: HeaderMap,
    default_timeout: Option<Duration>,
    authority: TokenAuthority,
    query_serializer: Arc<dyn QuerySerializer>,
    pipeline: Pipeline,
    operations: Operations,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("ApiClient")
            .field("transport", &inner.transport)
            .field("base_url", &inner.base_url)
            .field("base_path", &inner.base_path)
            .field("default_timeout", &inner.default_timeout)
            .field("operations", &inner.operations.len())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a builder with the default configuration.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }
}

impl<T: Transport> ApiClient<T> {
    /// The registered operations.
    pub fn operations(&self) -> &Operations {
        &self.inner.operations
    }

    /// The operation registered under `id`, bound to this client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::UnknownOperation`] when nothing is registered under `id`.
    pub fn operation<'a>(&'a self, id: &'a str) -> Result<Operation<'a, T>, ApiClientError> {
        let config = self
            .inner
            .operations
            .get(id)
            .ok_or_else(|| ApiClientError::UnknownOperation { id: id.to_string() })?;
        Ok(Operation::new(self, id, config))
    }

    /// Calls an operation and returns the response payload.
    ///
    /// An empty body yields `Value::Null`; a body that is not JSON yields the
    /// text as `Value::String`. Status and response headers are not exposed.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::MissingPathParameters`] before any network call
    /// - [`ApiClientError::Unauthorized`] when no usable token can be obtained
    /// - [`ApiClientError::Client`] or [`ApiClientError::Timeout`] when the
    ///   request fails
    pub async fn call(
        &self,
        operation: &OperationConfig,
        options: OperationOptions,
    ) -> Result<Value, ApiClientError> {
        let response = self.execute(operation, &options).await?;
        Ok(payload(&response.body))
    }

    /// Calls an operation and decodes the response payload as `R`.
    ///
    /// An empty body decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Every failure of [`call`](Self::call), plus [`ApiClientError::JsonError`]
    /// when the payload does not decode.
    pub async fn call_as<R>(
        &self,
        operation: &OperationConfig,
        options: OperationOptions,
    ) -> Result<R, ApiClientError>
    where
        R: DeserializeOwned,
    {
        let response = self.execute(operation, &options).await?;
        let body: &[u8] = if response.body.is_empty() {
            b"null"
        } else {
            &response.body
        };

        let deserializer = &mut serde_json::Deserializer::from_slice(body);
        serde_path_to_error::deserialize(deserializer).map_err(|err| ApiClientError::JsonError {
            path: err.path().to_string(),
            error: err.into_inner(),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }

    async fn execute(
        &self,
        operation: &OperationConfig,
        options: &OperationOptions,
    ) -> Result<RawResponse, ApiClientError> {
        let inner = &self.inner;
        let endpoint = resolve_endpoint(
            &operation.endpoint,
            options.path_params(),
            inner.base_path.as_deref(),
        )?;

        let mut request =
            PreparedRequest::new(operation.method.clone(), inner.base_url.as_str(), endpoint);
        request.headers = inner.headers.clone();
        request.timeout = inner.default_timeout;
        if let Some(data) = options.body() {
            request.body = Some(Bytes::from(serde_json::to_vec(data)?));
        }
        if let Some(query) = options.query_params() {
            request.query = Some(inner.query_serializer.serialize(query));
        }

        let token = inner
            .authority
            .authorization_header(&request.endpoint, operation.secure)
            .await?;
        if let Some(token) = token {
            request.set_authorization(token.to_bearer_header()?);
        }

        debug!(
            method = %request.method,
            endpoint = request.endpoint,
            secure = operation.secure,
            authorized = request.has_authorization(),
            "calling operation"
        );
        inner.pipeline.execute(&inner.transport, request).await
    }
}

fn payload(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
