use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use super::ApiClientError;

/// Regular expression for matching placeholders in the format `{param_name}`.
static RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?<name>[^{}]*)}").expect("a valid regex"));

/// Regular expression for runs of slashes.
static SLASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/{2,}").expect("a valid regex"));

fn replace_first_path_param(path: &str, param_name: &str, value: &str) -> String {
    let pattern = ["{", param_name, "}"].concat();
    path.replacen(&pattern, value, 1)
}

/// String form of a path parameter, `None` when the value counts as absent.
fn path_param_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| path_param_value(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn trim_slashes(fragment: &str) -> &str {
    fragment.trim_matches('/')
}

/// Slots path parameters into an endpoint template.
///
/// Each parameter replaces the first `{name}` occurrence. Parameters that are
/// `null` or the empty string are ignored. Any placeholder still present
/// afterwards is reported, each name once.
///
/// # Errors
///
/// Returns [`ApiClientError::MissingPathParameters`] listing every unresolved placeholder.
pub fn populate_endpoint(
    endpoint: &str,
    params: Option<&Map<String, Value>>,
) -> Result<String, ApiClientError> {
    let mut populated = endpoint.to_string();

    for (name, value) in params.into_iter().flatten() {
        let Some(value) = path_param_value(value) else {
            continue;
        };
        let replaced = replace_first_path_param(&populated, name, &value);
        if replaced == populated {
            warn!(?name, endpoint, "argument name not found");
        }
        populated = replaced;
    }

    let missings: IndexSet<String> = RE
        .captures_iter(&populated)
        .filter_map(|caps| caps.name("name"))
        .map(|name| name.as_str().to_string())
        .collect();

    if missings.is_empty() {
        Ok(populated)
    } else {
        Err(ApiClientError::MissingPathParameters {
            endpoint: populated,
            missings: missings.into_iter().collect(),
        })
    }
}

/// Prefixes `endpoint` with the base path, if any.
///
/// Both fragments are trimmed of leading and trailing slashes and joined with
/// exactly one `/`; doubled slashes are collapsed.
pub fn full_path(endpoint: &str, base_path: Option<&str>) -> String {
    match base_path {
        Some(base_path) => {
            let joined = format!("/{}/{}", trim_slashes(base_path), trim_slashes(endpoint));
            SLASHES.replace_all(&joined, "/").into_owned()
        }
        None => endpoint.to_string(),
    }
}

/// Resolves an endpoint template against its parameters and the base path.
///
/// # Errors
///
/// Fails when a placeholder remains unresolved, see [`populate_endpoint`].
pub fn resolve_endpoint(
    endpoint: &str,
    params: Option<&Map<String, Value>>,
    base_path: Option<&str>,
) -> Result<String, ApiClientError> {
    let populated = populate_endpoint(endpoint, params)?;
    Ok(full_path(&populated, base_path))
}

/// Joins a base URL and a path with a single slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    let path = SLASHES.replace_all(path.trim_start_matches('/'), "/");
    format!("{}/{path}", base_url.trim_end_matches('/'))
}
