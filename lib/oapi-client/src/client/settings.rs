use serde::{Deserialize, Serialize};

use super::ApiClientError;
use super::pipeline::Timeout;

/// The serializable part of the client configuration.
///
/// Callbacks (token retrievers, hooks, query serializer) cannot come from a
/// file; set them on the [`ApiClientBuilder`](super::ApiClientBuilder).
///
/// ```rust
/// use oapi_client::ClientSettings;
///
/// let settings = ClientSettings::from_json(r#"{
///     "base_url": "https://api.example.com",
///     "base_path": "/v1",
///     "timeout": { "get": 2000 },
///     "refresh_status_codes": [401, 403]
/// }"#)?;
/// assert_eq!(settings.base_path.as_deref(), Some("/v1"));
/// # Ok::<(), oapi_client::ApiClientError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// The API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Path prefix of every endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// Milliseconds, or a per-method map of milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Timeout>,
    /// Statuses that trigger a token refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_status_codes: Option<Vec<u16>>,
    /// `User-Agent` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// `X-App-Version` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Role granting the admin override on unsecured routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_role: Option<String>,
}

impl ClientSettings {
    /// Parses settings from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::SettingsError`] with the failing JSON path.
    pub fn from_json(json: &str) -> Result<Self, ApiClientError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(deserializer).map_err(|err| {
            ApiClientError::SettingsError {
                message: format!("settings at '{}': {}", err.path(), err.inner()),
            }
        })
    }

    /// Parses settings from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::SettingsError`] when the document is not valid.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(yaml: &str) -> Result<Self, ApiClientError> {
        serde_saphyr::from_str(yaml).map_err(|err| ApiClientError::SettingsError {
            message: format!("settings: {err}"),
        })
    }
}
