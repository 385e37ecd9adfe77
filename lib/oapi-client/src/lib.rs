//! # oapi-client
//!
//! The runtime request pipeline behind typed clients generated from OpenAPI
//! specifications.
//!
//! A code generator turns each API operation into an [`OperationConfig`]
//! (endpoint template, method, whether it is secured). At runtime, the
//! [`ApiClient`] turns such a descriptor plus [`OperationOptions`] into an
//! authenticated, correctly encoded HTTP request, and every failure into a
//! small set of typed errors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oapi_client::{ApiClient, OperationConfig, OperationOptions, TokenRetriever};
//! # use serde::Deserialize;
//! # #[derive(Deserialize)]
//! # struct User { id: u32, name: String }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::builder()
//!     .with_base_url("https://api.example.com")
//!     .with_api("Example API", "1.0.0")
//!     .with_get_access_token(TokenRetriever::new(|| async {
//!         std::env::var("API_TOKEN").ok()
//!     }))
//!     .build()?;
//!
//! let get_user = OperationConfig::new(http::Method::GET, "/users/{id}", true);
//! let user: User = client
//!     .call_as(&get_user, OperationOptions::new().with_param("id", 123)?)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Operations
//!
//! Descriptors can be registered once and called by id, either from the
//! generator's JSON output ([`Operations::from_json`]) or straight from an
//! OpenAPI document ([`Operations::from_openapi`], or `Operations::from_yaml`
//! with the `yaml` feature):
//!
//! ```rust,no_run
//! use oapi_client::{ApiClient, OperationOptions, Operations};
//!
//! # async fn example() -> Result<(), oapi_client::ApiClientError> {
//! let operations = Operations::from_json(r#"{
//!     "title": "Dog API",
//!     "version": "2",
//!     "operations": {
//!         "listBreedImages": { "endpoint": "/breed/{breed}/images", "method": "get" }
//!     }
//! }"#)?;
//!
//! let client = ApiClient::builder()
//!     .with_base_url("https://dog.ceo")
//!     .with_base_path("/api")
//!     .with_operations(operations)
//!     .build()?;
//!
//! let images = client
//!     .operation("listBreedImages")?
//!     .call(OperationOptions::new().with_param("breed", "hound")?)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Authentication
//!
//! Tokens are never cached: the `get_access_token` retriever runs on every
//! call. Secured operations require a valid bearer token, refreshed through
//! `refresh_access_token` when missing or expired. Unsecured operations are
//! anonymous, unless the token carries the admin role (`wp-admin` by default)
//! and is still valid.
//!
//! A request rejected with a refresh status (`401` by default) is replayed
//! once with a refreshed token.
//!
//! ## Errors
//!
//! Every failure is an [`ApiClientError`]. The ones raised by the call itself:
//!
//! - [`ApiClientError::Unauthorized`]: no usable token, before any network call
//! - [`ApiClientError::Client`]: HTTP error or network failure, with the
//!   server's message and validation errors
//! - [`ApiClientError::Timeout`]: the request timed out
//!
//! The [`Hooks`] observe failures as they are classified; without hooks, they
//! are logged with `tracing`.
//!
//! ## Features
//!
//! - `rustls` (default): HTTPS support through `reqwest`
//! - `yaml`: `Operations::from_yaml` and `ClientSettings::from_yaml`

mod client;

pub use self::client::{
    ApiClient, ApiClientBuilder, ApiClientError, BracketQuerySerializer, ClientError,
    ClientSettings, ClientTimeoutError, DEFAULT_ADMIN_ROLE, DEFAULT_REFRESH_STATUS_CODES,
    DEFAULT_REQUEST_TIMEOUT, ErrorCode, Hooks, MethodTimeouts, Operation, OperationConfig,
    OperationOptions, Operations, PreparedRequest, QuerySerializer, RawResponse, ReqwestTransport,
    RequestInfo, SecureString, TimeoutCode, Timeout, TokenFuture, TokenRetriever, Transport,
    TransportCode, TransportFailure, UnauthorizedError, ValidationError, X_APP_VERSION, full_path,
    populate_endpoint, resolve_endpoint, serialize_query_params,
};
