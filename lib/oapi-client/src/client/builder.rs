use std::sync::Arc;

use headers::{ContentType, HeaderMapExt};
use http::header::{ACCEPT, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use super::auth::{DEFAULT_ADMIN_ROLE, TokenAuthority, TokenRetriever};
use super::hooks::Hooks;
use super::operation::Operations;
use super::pipeline::{
    ConnectionResetReplay, DEFAULT_REFRESH_STATUS_CODES, ErrorNormalizer, Pipeline,
    RecoveryStage, RefreshRetry, RequestLog, RequestStage, Timeout, TimeoutPolicy,
};
use super::query::{BracketQuerySerializer, QuerySerializer};
use super::settings::ClientSettings;
use super::transport::{ReqwestTransport, Transport};
use super::{ApiClient, ApiClientError, ClientInner};

/// The `X-App-Version` header.
pub const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

/// Builder for [`ApiClient`] instances.
///
/// Only the base URL is mandatory.
///
/// # Default Configuration
///
/// - **Timeout**: 15 seconds for every request
/// - **Refresh status codes**: `[401]`
/// - **Query serializer**: [`BracketQuerySerializer`]
/// - **Admin role**: `wp-admin`
/// - **Hooks**: failures are logged with `tracing`
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use oapi_client::{ApiClient, Hooks, TokenRetriever};
///
/// # fn example() -> Result<(), oapi_client::ApiClientError> {
/// let client = ApiClient::builder()
///     .with_base_url("https://api.example.com")
///     .with_base_path("/v1")
///     .with_api("Pet Store", "1.0.0")
///     .with_get_access_token(TokenRetriever::new(|| async { Some("token".to_string()) }))
///     .with_timeout(Duration::from_secs(5))
///     .with_hooks(Hooks::default().with_on_error(|err| eprintln!("{err}")))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ApiClientBuilder<T = ReqwestTransport> {
    transport: T,
    base_url: Option<String>,
    base_path: Option<String>,
    get_access_token: Option<TokenRetriever>,
    refresh_access_token: Option<TokenRetriever>,
    refresh_status_codes: Vec<u16>,
    timeout: Timeout,
    hooks: Hooks,
    query_serializer: Arc<dyn QuerySerializer>,
    user_agent: Option<String>,
    app_version: Option<String>,
    operations: Operations,
    admin_role: String,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            transport: ReqwestTransport::default(),
            base_url: None,
            base_path: None,
            get_access_token: None,
            refresh_access_token: None,
            refresh_status_codes: DEFAULT_REFRESH_STATUS_CODES.to_vec(),
            timeout: Timeout::default(),
            hooks: Hooks::default(),
            query_serializer: Arc::new(BracketQuerySerializer),
            user_agent: None,
            app_version: None,
            operations: Operations::default(),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
        }
    }
}

impl ApiClientBuilder {
    /// Sends requests with an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_reqwest_client(self, client: reqwest::Client) -> Self {
        self.with_transport(ReqwestTransport::new(client))
    }
}

impl<T> ApiClientBuilder<T> {
    /// Sends requests through a custom [`Transport`].
    pub fn with_transport<U>(self, transport: U) -> ApiClientBuilder<U> {
        let Self {
            transport: _,
            base_url,
            base_path,
            get_access_token,
            refresh_access_token,
            refresh_status_codes,
            timeout,
            hooks,
            query_serializer,
            user_agent,
            app_version,
            operations,
            admin_role,
        } = self;

        ApiClientBuilder {
            transport,
            base_url,
            base_path,
            get_access_token,
            refresh_access_token,
            refresh_status_codes,
            timeout,
            hooks,
            query_serializer,
            user_agent,
            app_version,
            operations,
            admin_role,
        }
    }

    /// Sets the API base URL, e.g. `https://api.example.com`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets a path prefix for every endpoint, e.g. `/v1`.
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Sets the access token retriever, invoked on every call.
    #[must_use]
    pub fn with_get_access_token(mut self, retriever: TokenRetriever) -> Self {
        self.get_access_token = Some(retriever);
        self
    }

    /// Sets the token refresher, used when the access token is missing or
    /// expired, and to replay requests rejected with a refresh status.
    #[must_use]
    pub fn with_refresh_access_token(mut self, refresher: TokenRetriever) -> Self {
        self.refresh_access_token = Some(refresher);
        self
    }

    /// Sets the statuses that trigger a token refresh and a replay.
    #[must_use]
    pub fn with_refresh_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.refresh_status_codes = codes.into_iter().collect();
        self
    }

    /// Sets a uniform ([`Duration`](std::time::Duration)) or per-method
    /// ([`MethodTimeouts`](super::MethodTimeouts)) timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Sets the observability hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces the default [`BracketQuerySerializer`].
    #[must_use]
    pub fn with_query_serializer(mut self, serializer: impl QuerySerializer + 'static) -> Self {
        self.query_serializer = Arc::new(serializer);
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the `X-App-Version` header.
    #[must_use]
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = Some(app_version.into());
        self
    }

    /// Sets the API title and version used in the `Accept` header.
    #[must_use]
    pub fn with_api(mut self, title: impl Into<String>, version: impl Into<String>) -> Self {
        self.operations = std::mem::take(&mut self.operations).with_info(title, version);
        self
    }

    /// Registers the API operations, title and version included.
    #[must_use]
    pub fn with_operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    /// Sets the role granting the admin override on unsecured routes.
    #[must_use]
    pub fn with_admin_role(mut self, role: impl Into<String>) -> Self {
        self.admin_role = role.into();
        self
    }

    /// Applies every field set in `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        let ClientSettings {
            base_url,
            base_path,
            timeout,
            refresh_status_codes,
            user_agent,
            app_version,
            admin_role,
        } = settings;

        self.base_url = base_url.or(self.base_url);
        self.base_path = base_path.or(self.base_path);
        self.timeout = timeout.unwrap_or(self.timeout);
        self.refresh_status_codes = refresh_status_codes.unwrap_or(self.refresh_status_codes);
        self.user_agent = user_agent.or(self.user_agent);
        self.app_version = app_version.or(self.app_version);
        self.admin_role = admin_role.unwrap_or(self.admin_role);
        self
    }
}

impl<T: Transport> ApiClientBuilder<T> {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::MissingBaseUrl`] without a (non-empty) base URL
    /// - [`ApiClientError::UrlError`] when the base URL is not an absolute URL
    /// - [`ApiClientError::InvalidHeaderValue`] when a header cannot be built
    pub fn build(self) -> Result<ApiClient<T>, ApiClientError> {
        let Self {
            transport,
            base_url,
            base_path,
            get_access_token,
            refresh_access_token,
            refresh_status_codes,
            timeout,
            hooks,
            query_serializer,
            user_agent,
            app_version,
            operations,
            admin_role,
        } = self;

        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ApiClientError::MissingBaseUrl)?;
        Url::parse(&base_url)?;

        let headers = default_headers(&operations, user_agent.as_deref(), app_version.as_deref())?;

        let hooks = Arc::new(hooks);
        let mut pipeline = Pipeline::new(ErrorNormalizer::new(Arc::clone(&hooks)));
        if let Timeout::PerMethod(timeouts) = timeout {
            let policy = TimeoutPolicy::new(timeouts);
            pipeline = pipeline.with_request_stage(RequestStage::Timeout(policy));
        }
        if hooks.has_on_request() {
            let log = RequestLog::new(Arc::clone(&hooks));
            pipeline = pipeline.with_request_stage(RequestStage::Log(log));
        }
        if refresh_access_token.is_some() {
            let retry = RefreshRetry::new(refresh_access_token.clone(), refresh_status_codes);
            pipeline = pipeline.with_recovery_stage(RecoveryStage::RefreshToken(retry));
        }
        let replay = ConnectionResetReplay::default();
        pipeline = pipeline.with_recovery_stage(RecoveryStage::ConnectionReset(replay));

        debug!(base_url, ?base_path, operations = operations.len(), "building client");

        let authority = TokenAuthority::new(get_access_token, refresh_access_token, admin_role);
        let inner = ClientInner {
            transport,
            base_url,
            base_path,
            headers,
            default_timeout: timeout.default_timeout(),
            authority,
            query_serializer,
            pipeline,
            operations,
        };

        Ok(ApiClient {
            inner: Arc::new(inner),
        })
    }
}

/// `application/vnd.{title}+json; version={version}` where the title is
/// lower-cased with its word separators removed.
fn accept_header(title: &str, version: &str) -> Result<HeaderValue, ApiClientError> {
    use cruet::*;

    if title.trim().is_empty() {
        return Ok(HeaderValue::from_str(mime::APPLICATION_JSON.as_ref())?);
    }
    let vendor = title.to_kebab_case().replace('-', "");
    let value = HeaderValue::from_str(&format!(
        "application/vnd.{vendor}+json; version={version}"
    ))?;
    Ok(value)
}

fn default_headers(
    operations: &Operations,
    user_agent: Option<&str>,
    app_version: Option<&str>,
) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    headers.typed_insert(ContentType::json());
    headers.insert(ACCEPT, accept_header(operations.title(), operations.version())?);
    if let Some(user_agent) = user_agent {
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    }
    if let Some(app_version) = app_version {
        headers.insert(X_APP_VERSION, HeaderValue::from_str(app_version)?);
    }
    Ok(headers)
}
