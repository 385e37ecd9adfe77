//! Query string serialization.
//!
//! The default [`BracketQuerySerializer`] follows the bracket convention used
//! by most JSON APIs:
//!
//! - scalars: `?name=value`
//! - arrays: `?tags[]=rust&tags[]=web`
//! - nested objects: `?filter[status]=open`
//!
//! Only values are percent-encoded; keys, including their brackets, are sent
//! verbatim.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

/// RFC 3986 unreserved characters stay as they are.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Turns a query parameter object into a query string (without the leading `?`).
///
/// Any `Fn(&Map<String, Value>) -> String` closure is a serializer:
///
/// ```rust
/// use oapi_client::QuerySerializer;
/// use serde_json::{Map, Value, json};
///
/// let as_json = |params: &Map<String, Value>| Value::Object(params.clone()).to_string();
/// let Value::Object(params) = json!({ "foo": "bar" }) else { unreachable!() };
///
/// assert_eq!(as_json.serialize(&params), r#"{"foo":"bar"}"#);
/// ```
pub trait QuerySerializer: Send + Sync {
    /// Encodes `params` as a query string.
    fn serialize(&self, params: &Map<String, Value>) -> String;
}

impl<F> QuerySerializer for F
where
    F: Fn(&Map<String, Value>) -> String + Send + Sync,
{
    fn serialize(&self, params: &Map<String, Value>) -> String {
        self(params)
    }
}

/// The default serializer: bracket notation for arrays and nested objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketQuerySerializer;

impl QuerySerializer for BracketQuerySerializer {
    fn serialize(&self, params: &Map<String, Value>) -> String {
        let mut pairs = Vec::new();
        for (key, value) in params {
            push_pairs(&mut pairs, key, value);
        }
        pairs.join("&")
    }
}

fn push_pairs(pairs: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            let key = format!("{key}[]");
            for item in items {
                push_pairs(pairs, &key, item);
            }
        }
        Value::Object(fields) => {
            for (field, item) in fields {
                push_pairs(pairs, &format!("{key}[{field}]"), item);
            }
        }
        Value::Null => pairs.push(format!("{key}=")),
        Value::String(text) => pairs.push(format!("{key}={}", encode_value(text))),
        Value::Bool(_) | Value::Number(_) => {
            pairs.push(format!("{key}={}", encode_value(&value.to_string())));
        }
    }
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, VALUE_ENCODE_SET).to_string()
}

/// Delegates to the [`BracketQuerySerializer`].
pub fn serialize_query_params(params: &Map<String, Value>) -> String {
    BracketQuerySerializer.serialize(params)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn should_serialize_scalars() {
        let query = serialize_query_params(&params(json!({
            "foo": "bar",
            "limit": 10,
            "active": true,
        })));

        assert_eq!(query, "foo=bar&limit=10&active=true");
    }

    #[test]
    fn should_serialize_arrays_with_brackets() {
        let query = serialize_query_params(&params(json!({ "foo": ["bar", "baz"] })));

        assert_eq!(query, "foo[]=bar&foo[]=baz");
    }

    #[test]
    fn should_serialize_nested_objects() {
        let query = serialize_query_params(&params(json!({
            "filter": { "status": "open", "owner": { "id": 3 } },
        })));

        assert_eq!(query, "filter[status]=open&filter[owner][id]=3");
    }

    #[test]
    fn should_serialize_arrays_of_objects() {
        let query = serialize_query_params(&params(json!({
            "sort": [{ "field": "name" }, { "field": "age" }],
        })));

        assert_eq!(query, "sort[][field]=name&sort[][field]=age");
    }

    #[test]
    fn should_encode_values_only() {
        let query = serialize_query_params(&params(json!({
            "q[term]": "hello world & more",
            "email": "test@example.com",
            "safe": "a-b_c.d~e",
        })));

        insta::assert_snapshot!(query, @"q[term]=hello%20world%20%26%20more&email=test%40example.com&safe=a-b_c.d~e");
    }

    #[test]
    fn should_handle_null_and_empty_collections() {
        let query = serialize_query_params(&params(json!({
            "cursor": null,
            "tags": [],
            "filter": {},
            "page": 2,
        })));

        assert_eq!(query, "cursor=&page=2");
    }

    #[test]
    fn should_serialize_empty_params_as_empty_string() {
        assert_eq!(serialize_query_params(&Map::new()), "");
    }

    #[test]
    fn should_accept_closures_as_serializers() {
        let serializer = |params: &Map<String, Value>| format!("count={}", params.len());

        assert_eq!(
            serializer.serialize(&params(json!({ "a": 1, "b": 2 }))),
            "count=2"
        );
    }
}
