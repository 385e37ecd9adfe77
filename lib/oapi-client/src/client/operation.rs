use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;
use utoipa::openapi::OpenApi;
use utoipa::openapi::path::Operation as PathOperation;

use super::transport::{ReqwestTransport, Transport};
use super::{ApiClient, ApiClientError};

/// An operation descriptor: what the code generator emits for each API operation.
///
/// ```rust
/// use oapi_client::OperationConfig;
///
/// let config: OperationConfig = serde_json::from_str(
///     r#"{ "endpoint": "/users/{id}", "method": "get", "secure": true }"#,
/// )?;
/// assert_eq!(config.method, http::Method::GET);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Endpoint template, e.g. `/users/{id}`.
    pub endpoint: String,
    /// HTTP method, case-insensitive in JSON.
    #[serde(with = "method_name")]
    pub method: Method,
    /// Whether the operation requires authentication.
    #[serde(default)]
    pub secure: bool,
}

impl OperationConfig {
    /// Creates a descriptor.
    pub fn new(method: Method, endpoint: impl Into<String>, secure: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            secure,
        }
    }
}

mod method_name {
    use super::{Deserialize, Deserializer, Method, Serializer};

    pub(super) fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&method.as_str().to_ascii_lowercase())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let name = String::deserialize(deserializer)?;
        Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// The operations of an API, by operation id, with the API title and version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operations {
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    operations: IndexMap<String, OperationConfig>,
}

impl Operations {
    /// An empty registry.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            operations: IndexMap::new(),
        }
    }

    /// Replaces the API title and version, keeping the operations.
    #[must_use]
    pub fn with_info(mut self, title: impl Into<String>, version: impl Into<String>) -> Self {
        self.title = title.into();
        self.version = version.into();
        self
    }

    /// Registers `config` under `id`, replacing any previous entry.
    #[must_use]
    pub fn with_operation(mut self, id: impl Into<String>, config: OperationConfig) -> Self {
        self.operations.insert(id.into(), config);
        self
    }

    /// Parses a registry from JSON:
    ///
    /// ```json
    /// {
    ///   "title": "Pet Store",
    ///   "version": "1.0.0",
    ///   "operations": {
    ///     "getPet": { "endpoint": "/pets/{id}", "method": "get", "secure": false }
    ///   }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::SettingsError`] with the failing JSON path.
    pub fn from_json(json: &str) -> Result<Self, ApiClientError> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(deserializer).map_err(|err| {
            ApiClientError::SettingsError {
                message: format!("operations at '{}': {}", err.path(), err.inner()),
            }
        })
    }

    /// Collects the operations of an OpenAPI document.
    ///
    /// Every operation with an `operationId` is registered; it is secure when it
    /// lists at least one security requirement. Title and version come from
    /// `info`.
    pub fn from_openapi(openapi: &OpenApi) -> Self {
        let mut result = Self::new(&openapi.info.title, &openapi.info.version);

        for (path, item) in &openapi.paths.paths {
            let operations = [
                (Method::GET, &item.get),
                (Method::PUT, &item.put),
                (Method::POST, &item.post),
                (Method::DELETE, &item.delete),
                (Method::OPTIONS, &item.options),
                (Method::HEAD, &item.head),
                (Method::PATCH, &item.patch),
                (Method::TRACE, &item.trace),
            ];
            for (method, operation) in operations {
                let Some(operation) = operation else {
                    continue;
                };
                let Some(id) = &operation.operation_id else {
                    debug!(%method, path, "skipping operation without operationId");
                    continue;
                };
                let config = OperationConfig::new(method, path, is_secure(operation));
                result.operations.insert(id.clone(), config);
            }
        }

        result
    }

    /// Parses an OpenAPI YAML document, then collects its operations.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::SettingsError`] when the document is not valid.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(yaml: &str) -> Result<Self, ApiClientError> {
        let openapi: OpenApi =
            serde_saphyr::from_str(yaml).map_err(|err| ApiClientError::SettingsError {
                message: format!("OpenAPI document: {err}"),
            })?;
        Ok(Self::from_openapi(&openapi))
    }

    /// The API title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The API version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The operation registered under `id`.
    pub fn get(&self, id: &str) -> Option<&OperationConfig> {
        self.operations.get(id)
    }

    /// Operation ids and descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationConfig)> {
        self.operations
            .iter()
            .map(|(id, config)| (id.as_str(), config))
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn is_secure(operation: &PathOperation) -> bool {
    operation
        .security
        .as_ref()
        .is_some_and(|security| !security.is_empty())
}

/// Whether a value counts as absent: `null`, `""`, `[]` or `{}`.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn to_object(value: impl Serialize, what: &str) -> Result<Map<String, Value>, ApiClientError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ApiClientError::JsonValueError(serde::ser::Error::custom(
            format!("{what} must serialize to an object, got {other}"),
        ))),
    }
}

/// What a call sends besides the operation itself.
///
/// Empty values (`null`, `""`, `[]`, `{}`) are not sent.
///
/// ```rust
/// use oapi_client::OperationOptions;
/// use serde_json::json;
///
/// let options = OperationOptions::new()
///     .with_param("id", 42)?
///     .with_query_param("expand", ["owner"])?
///     .with_data(json!({ "name": "Rex" }))?;
/// # Ok::<(), oapi_client::ApiClientError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationOptions {
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Query parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    /// Path parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl OperationOptions {
    /// No body, query nor path parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request body.
    ///
    /// # Errors
    ///
    /// Fails when `data` cannot be serialized to JSON.
    pub fn with_data(mut self, data: impl Serialize) -> Result<Self, ApiClientError> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    /// Replaces all query parameters.
    ///
    /// # Errors
    ///
    /// Fails when `query` does not serialize to a JSON object.
    pub fn with_query(mut self, query: impl Serialize) -> Result<Self, ApiClientError> {
        self.query = Some(to_object(query, "query")?);
        Ok(self)
    }

    /// Adds a query parameter.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be serialized to JSON.
    pub fn with_query_param(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, ApiClientError> {
        let value = serde_json::to_value(value)?;
        self.query
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        Ok(self)
    }

    /// Replaces all path parameters.
    ///
    /// # Errors
    ///
    /// Fails when `params` does not serialize to a JSON object.
    pub fn with_params(mut self, params: impl Serialize) -> Result<Self, ApiClientError> {
        self.params = Some(to_object(params, "params")?);
        Ok(self)
    }

    /// Adds a path parameter.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be serialized to JSON.
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, ApiClientError> {
        let value = serde_json::to_value(value)?;
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value);
        Ok(self)
    }

    pub(crate) fn body(&self) -> Option<&Value> {
        self.data.as_ref().filter(|data| !is_empty_value(data))
    }

    pub(crate) fn query_params(&self) -> Option<&Map<String, Value>> {
        self.query.as_ref().filter(|query| !query.is_empty())
    }

    pub(crate) fn path_params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref().filter(|params| !params.is_empty())
    }
}

/// A registered operation bound to its client.
#[derive(Debug)]
pub struct Operation<'a, T: Transport = ReqwestTransport> {
    client: &'a ApiClient<T>,
    id: &'a str,
    config: &'a OperationConfig,
}

impl<'a, T: Transport> Operation<'a, T> {
    pub(crate) fn new(client: &'a ApiClient<T>, id: &'a str, config: &'a OperationConfig) -> Self {
        Self { client, id, config }
    }

    /// The operation id.
    pub fn id(&self) -> &str {
        self.id
    }

    /// The operation descriptor.
    pub fn config(&self) -> &OperationConfig {
        self.config
    }

    /// See [`ApiClient::call`].
    ///
    /// # Errors
    ///
    /// Every failure of the call, see [`ApiClientError`].
    pub async fn call(&self, options: OperationOptions) -> Result<Value, ApiClientError> {
        self.client.call(self.config, options).await
    }

    /// See [`ApiClient::call_as`].
    ///
    /// # Errors
    ///
    /// Every failure of the call, plus [`ApiClientError::JsonError`] when the
    /// payload does not decode as `R`.
    pub async fn call_as<R>(&self, options: OperationOptions) -> Result<R, ApiClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        self.client.call_as(self.config, options).await
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use utoipa::openapi::path::{HttpMethod, OperationBuilder, PathItemBuilder};
    use utoipa::openapi::security::SecurityRequirement;
    use utoipa::openapi::{InfoBuilder, OpenApiBuilder, PathsBuilder};

    use super::*;

    #[rstest]
    #[case::lowercase("get", Method::GET)]
    #[case::uppercase("DELETE", Method::DELETE)]
    #[case::mixed("Patch", Method::PATCH)]
    fn should_parse_method_case_insensitively(#[case] name: &str, #[case] expected: Method) {
        let config: OperationConfig =
            serde_json::from_value(json!({ "endpoint": "/x", "method": name })).expect("valid");

        assert_eq!(config.method, expected);
        assert!(!config.secure);
    }

    #[test]
    fn should_parse_operations_from_json() {
        let operations = Operations::from_json(
            r#"{
                "title": "Pet Store",
                "version": "1.0.0",
                "operations": {
                    "listPets": { "endpoint": "/pets", "method": "get", "secure": false },
                    "createPet": { "endpoint": "/pets", "method": "post", "secure": true }
                }
            }"#,
        )
        .expect("valid operations");

        assert_eq!(operations.title(), "Pet Store");
        assert_eq!(operations.version(), "1.0.0");
        let ids = operations.iter().map(|(id, _)| id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["listPets", "createPet"]);
        assert_eq!(
            operations.get("createPet"),
            Some(&OperationConfig::new(Method::POST, "/pets", true))
        );
    }

    #[test]
    fn should_report_json_path_of_invalid_operation() {
        let result = Operations::from_json(
            r#"{ "operations": { "broken": { "endpoint": "/x", "method": 42 } } }"#,
        );

        let Err(ApiClientError::SettingsError { message }) = result else {
            panic!("expected a settings error");
        };
        assert!(message.starts_with("operations at 'operations.broken.method'"), "{message}");
    }

    #[test]
    fn should_collect_operations_from_openapi() {
        let secured = OperationBuilder::new()
            .operation_id(Some("getPet"))
            .securities(Some([SecurityRequirement::new(
                "bearer",
                Vec::<String>::new(),
            )]))
            .build();
        let public = OperationBuilder::new()
            .operation_id(Some("listPets"))
            .build();
        let anonymous = OperationBuilder::new().build();
        let openapi = OpenApiBuilder::new()
            .info(InfoBuilder::new().title("Pet Store").version("2.1.0").build())
            .paths(
                PathsBuilder::new()
                    .path(
                        "/pets/{id}",
                        PathItemBuilder::new()
                            .operation(HttpMethod::Get, secured)
                            .build(),
                    )
                    .path(
                        "/pets",
                        PathItemBuilder::new()
                            .operation(HttpMethod::Get, public)
                            .operation(HttpMethod::Post, anonymous)
                            .build(),
                    ),
            )
            .build();

        let operations = Operations::from_openapi(&openapi);

        assert_eq!(operations.title(), "Pet Store");
        assert_eq!(operations.version(), "2.1.0");
        assert_eq!(operations.len(), 2);
        assert_eq!(
            operations.get("getPet"),
            Some(&OperationConfig::new(Method::GET, "/pets/{id}", true))
        );
        assert_eq!(
            operations.get("listPets"),
            Some(&OperationConfig::new(Method::GET, "/pets", false))
        );
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn should_collect_operations_from_yaml() {
        let yaml = r"
openapi: 3.1.0
info:
  title: My API
  version: 3.0.0
paths:
  /things/{id}:
    delete:
      operationId: deleteThing
      security:
        - bearer: []
      responses: {}
";

        let operations = Operations::from_yaml(yaml).expect("valid document");

        assert_eq!(operations.title(), "My API");
        assert_eq!(
            operations.get("deleteThing"),
            Some(&OperationConfig::new(Method::DELETE, "/things/{id}", true))
        );
    }

    #[rstest]
    #[case::null(json!(null), true)]
    #[case::empty_string(json!(""), true)]
    #[case::empty_array(json!([]), true)]
    #[case::empty_object(json!({}), true)]
    #[case::zero(json!(0), false)]
    #[case::falsy(json!(false), false)]
    #[case::text(json!("x"), false)]
    #[case::object(json!({ "a": 1 }), false)]
    fn should_detect_empty_values(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_empty_value(&value), expected);
    }

    #[test]
    fn should_skip_empty_options() {
        let options = OperationOptions::new()
            .with_data(json!({}))
            .and_then(|options| options.with_query(json!({})))
            .expect("valid options");

        assert_eq!(options.body(), None);
        assert_eq!(options.query_params(), None);
        assert_eq!(options.path_params(), None);
    }

    #[test]
    fn should_build_options() {
        let options = OperationOptions::new()
            .with_param("id", 42)
            .and_then(|options| options.with_query_param("tags", ["a", "b"]))
            .and_then(|options| options.with_data(json!({ "name": "Rex" })))
            .expect("valid options");

        let id = options.path_params().and_then(|params| params.get("id"));
        assert_eq!(id, Some(&json!(42)));
        assert_eq!(options.query_params().map(Map::len), Some(1));
        assert_eq!(options.body(), Some(&json!({ "name": "Rex" })));
    }

    #[test]
    fn should_reject_non_object_query() {
        let result = OperationOptions::new().with_query([1, 2, 3]);

        let Err(error) = result else {
            panic!("expected an error");
        };
        insta::assert_snapshot!(error, @"query must serialize to an object, got [1,2,3]");
    }
}
