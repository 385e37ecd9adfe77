use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::HeaderValue;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::UnauthorizedError;
use super::token::{has_role, is_token_expired};

/// The role literal granting the admin override on unsecured routes.
pub const DEFAULT_ADMIN_ROLE: &str = "wp-admin";

/// Secure wrapper for sensitive string data that automatically zeroes memory on drop.
///
/// Access tokens are held in this wrapper from the moment a retriever returns
/// them until the `Authorization` header is built.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    /// Creates a new secure string from the provided value.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Returns a reference to the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the inner string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the `Bearer <token>` header value.
    ///
    /// # Errors
    ///
    /// Fails when the token contains characters not allowed in a header.
    pub fn to_bearer_header(&self) -> Result<HeaderValue, http::header::InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn mask_sensitive(value: &str) -> String {
        if value.len() <= 8 {
            "***".to_string()
        } else {
            let head = value.get(..4).unwrap_or_default();
            let tail = value.get(value.len() - 4..).unwrap_or_default();
            format!("{head}...{tail}")
        }
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::mask_sensitive(&self.0))
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

/// The future returned by a [`TokenRetriever`].
pub type TokenFuture = Pin<Box<dyn Future<Output = Option<String>> + Send>>;

/// A caller-supplied function producing an access token on demand.
///
/// Used both for the access token retriever and for the refresher. Caching is
/// the caller's business: the client invokes the retriever on every call.
///
/// ```rust
/// use oapi_client::TokenRetriever;
///
/// let retriever = TokenRetriever::new(|| async { Some("my-token".to_string()) });
/// let anonymous = TokenRetriever::new(|| async { None });
/// ```
#[derive(Clone)]
pub struct TokenRetriever(Arc<dyn Fn() -> TokenFuture + Send + Sync>);

impl TokenRetriever {
    /// Wraps an async function returning an optional token.
    pub fn new<F, Fut>(retrieve: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(retrieve())))
    }

    /// Invokes the function; an empty string counts as no token.
    pub(crate) async fn retrieve(&self) -> Option<SecureString> {
        (self.0)()
            .await
            .map(SecureString::new)
            .filter(|token| !token.is_empty())
    }
}

impl fmt::Debug for TokenRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenRetriever")
    }
}

/// Decides whether a request carries a bearer token, and which one.
#[derive(Debug, Clone)]
pub(crate) struct TokenAuthority {
    get_access_token: Option<TokenRetriever>,
    refresh_access_token: Option<TokenRetriever>,
    admin_role: String,
}

impl TokenAuthority {
    pub(crate) fn new(
        get_access_token: Option<TokenRetriever>,
        refresh_access_token: Option<TokenRetriever>,
        admin_role: String,
    ) -> Self {
        Self {
            get_access_token,
            refresh_access_token,
            admin_role,
        }
    }

    pub(crate) fn refresher(&self) -> Option<&TokenRetriever> {
        self.refresh_access_token.as_ref()
    }

    /// Returns the token to send as `Bearer`, `None` to proceed anonymously.
    ///
    /// # Errors
    ///
    /// Every unmet precondition yields an [`UnauthorizedError`] naming it and `url`.
    pub(crate) async fn authorization_header(
        &self,
        url: &str,
        secure: bool,
    ) -> Result<Option<SecureString>, UnauthorizedError> {
        if secure && self.get_access_token.is_none() {
            return Err(UnauthorizedError::new(
                "Authorization is required but no `get_access_token` function was provided",
                url,
            ));
        }

        let candidate = match &self.get_access_token {
            Some(retriever) => retriever.retrieve().await,
            None => None,
        };

        if !secure
            && !candidate
                .as_ref()
                .is_some_and(|token| has_role(token.as_str(), &self.admin_role))
        {
            return Ok(None);
        }

        let mut token = match candidate {
            Some(token) => token,
            None => self.refreshed_token(url).await?,
        };

        // An admin calling an unsecured route with an expired token goes anonymous
        if !secure && is_token_expired(token.as_str()) {
            debug!(url, "admin token expired on unsecured route, proceeding anonymously");
            return Ok(None);
        }

        if is_token_expired(token.as_str()) {
            token = self.refreshed_token(url).await?;

            if is_token_expired(token.as_str()) {
                return Err(UnauthorizedError::new(
                    "Authorization is required but the access token has expired and `refresh_access_token` also returned an expired token",
                    url,
                ));
            }
        }

        Ok(Some(token))
    }

    async fn refreshed_token(&self, url: &str) -> Result<SecureString, UnauthorizedError> {
        let Some(refresher) = &self.refresh_access_token else {
            return Err(UnauthorizedError::new(
                "Authorization is required but there is no valid access token and no `refresh_access_token` function was provided",
                url,
            ));
        };

        refresher.retrieve().await.ok_or_else(|| {
            UnauthorizedError::new(
                "Authorization is required but there is no valid access token and nothing was returned from `refresh_access_token`",
                url,
            )
        })
    }
}
