use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::client::transport::PreparedRequest;

/// Default timeout applied to every request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Request timeout configuration.
///
/// In settings files, a number of milliseconds is a [`Uniform`](Self::Uniform)
/// timeout and a map of lowercase methods is a [`PerMethod`](Self::PerMethod)
/// one:
///
/// ```rust
/// use std::time::Duration;
/// use oapi_client::Timeout;
///
/// let uniform: Timeout = serde_json::from_str("2000")?;
/// assert_eq!(uniform, Timeout::Uniform(Duration::from_secs(2)));
///
/// let per_method: Timeout = serde_json::from_str(r#"{ "get": 500 }"#)?;
/// assert!(matches!(per_method, Timeout::PerMethod(_)));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawTimeout", into = "RawTimeout")]
pub enum Timeout {
    /// Same timeout for every request, applied once at construction.
    Uniform(Duration),
    /// Timeouts for some methods; other methods have no timeout.
    PerMethod(MethodTimeouts),
}

impl Default for Timeout {
    fn default() -> Self {
        Self::Uniform(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Self {
        Self::Uniform(value)
    }
}

impl From<MethodTimeouts> for Timeout {
    fn from(value: MethodTimeouts) -> Self {
        Self::PerMethod(value)
    }
}

impl Timeout {
    /// The timeout every request starts with.
    ///
    /// A zero uniform timeout disables the timeout.
    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        match self {
            Self::Uniform(timeout) if timeout.is_zero() => None,
            Self::Uniform(timeout) => Some(*timeout),
            Self::PerMethod(_) => None,
        }
    }
}

/// Per-method timeouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodTimeouts {
    get: Option<Duration>,
    post: Option<Duration>,
    put: Option<Duration>,
    patch: Option<Duration>,
    delete: Option<Duration>,
}

impl MethodTimeouts {
    /// Sets the timeout for `method`.
    ///
    /// Only `GET`, `POST`, `PUT`, `PATCH` and `DELETE` can be configured; other
    /// methods are ignored.
    #[must_use]
    pub fn with(mut self, method: &Method, timeout: Duration) -> Self {
        if let Some(slot) = self.slot_mut(method) {
            *slot = Some(timeout);
        }
        self
    }

    /// The timeout configured for `method`, if any.
    pub fn get(&self, method: &Method) -> Option<Duration> {
        match method.as_str().to_ascii_lowercase().as_str() {
            "get" => self.get,
            "post" => self.post,
            "put" => self.put,
            "patch" => self.patch,
            "delete" => self.delete,
            _ => None,
        }
    }

    fn slot_mut(&mut self, method: &Method) -> Option<&mut Option<Duration>> {
        match method.as_str().to_ascii_lowercase().as_str() {
            "get" => Some(&mut self.get),
            "post" => Some(&mut self.post),
            "put" => Some(&mut self.put),
            "patch" => Some(&mut self.patch),
            "delete" => Some(&mut self.delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTimeout {
    Millis(u64),
    PerMethod(RawMethodTimeouts),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMethodTimeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    get: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    put: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delete: Option<u64>,
}

fn millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

impl From<RawTimeout> for Timeout {
    fn from(value: RawTimeout) -> Self {
        match value {
            RawTimeout::Millis(millis) => Self::Uniform(Duration::from_millis(millis)),
            RawTimeout::PerMethod(raw) => Self::PerMethod(MethodTimeouts {
                get: raw.get.map(Duration::from_millis),
                post: raw.post.map(Duration::from_millis),
                put: raw.put.map(Duration::from_millis),
                patch: raw.patch.map(Duration::from_millis),
                delete: raw.delete.map(Duration::from_millis),
            }),
        }
    }
}

impl From<Timeout> for RawTimeout {
    fn from(value: Timeout) -> Self {
        match value {
            Timeout::Uniform(timeout) => Self::Millis(millis(timeout)),
            Timeout::PerMethod(timeouts) => Self::PerMethod(RawMethodTimeouts {
                get: timeouts.get.map(millis),
                post: timeouts.post.map(millis),
                put: timeouts.put.map(millis),
                patch: timeouts.patch.map(millis),
                delete: timeouts.delete.map(millis),
            }),
        }
    }
}

/// Applies per-method timeout overrides.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeoutPolicy {
    timeouts: MethodTimeouts,
}

impl TimeoutPolicy {
    pub(crate) fn new(timeouts: MethodTimeouts) -> Self {
        Self { timeouts }
    }

    pub(crate) fn apply(&self, request: &mut PreparedRequest) {
        if let Some(timeout) = self.timeouts.get(&request.method) {
            request.timeout = Some(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method) -> PreparedRequest {
        let mut request = PreparedRequest::new(method, "http://api.com", "/things");
        request.timeout = Some(Duration::from_secs(30));
        request
    }

    #[test]
    fn should_override_configured_method() {
        let policy = TimeoutPolicy::new(
            MethodTimeouts::default().with(&Method::GET, Duration::from_millis(2000)),
        );
        let mut request = request(Method::GET);

        policy.apply(&mut request);

        assert_eq!(request.timeout, Some(Duration::from_millis(2000)));
    }

    #[test]
    fn should_keep_default_for_other_methods() {
        let policy = TimeoutPolicy::new(
            MethodTimeouts::default().with(&Method::GET, Duration::from_millis(2000)),
        );
        let mut request = request(Method::POST);

        policy.apply(&mut request);

        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn should_ignore_unsupported_methods() {
        let timeouts = MethodTimeouts::default().with(&Method::OPTIONS, Duration::from_secs(1));

        assert_eq!(timeouts, MethodTimeouts::default());
        assert_eq!(timeouts.get(&Method::OPTIONS), None);
    }

    #[test]
    fn should_default_to_fifteen_seconds() {
        assert_eq!(
            Timeout::default().default_timeout(),
            Some(Duration::from_secs(15))
        );
        let per_method = Timeout::PerMethod(MethodTimeouts::default());
        assert_eq!(per_method.default_timeout(), None);
    }

    #[test]
    fn should_disable_zero_timeout() {
        let timeout: Timeout = serde_json::from_str("0").expect("uniform");

        assert_eq!(timeout, Timeout::Uniform(Duration::ZERO));
        assert_eq!(timeout.default_timeout(), None);
    }

    #[test]
    fn should_deserialize_timeouts() {
        let timeout: Timeout = serde_json::from_str("100").expect("uniform");
        assert_eq!(timeout, Timeout::Uniform(Duration::from_millis(100)));

        let timeout: Timeout =
            serde_json::from_str(r#"{ "get": 2000, "delete": 500 }"#).expect("per method");
        let Timeout::PerMethod(timeouts) = timeout else {
            panic!("expected per method timeouts");
        };
        assert_eq!(timeouts.get(&Method::GET), Some(Duration::from_millis(2000)));
        assert_eq!(timeouts.get(&Method::DELETE), Some(Duration::from_millis(500)));
        assert_eq!(timeouts.get(&Method::POST), None);
    }

    #[test]
    fn should_reject_unknown_methods_in_settings() {
        let result = serde_json::from_str::<Timeout>(r#"{ "fetch": 10 }"#);

        assert!(result.is_err());
    }

    #[test]
    fn should_serialize_as_millis() {
        let timeout = Timeout::PerMethod(
            MethodTimeouts::default().with(&Method::PUT, Duration::from_secs(3)),
        );

        let json = serde_json::to_string(&timeout).expect("serialize");

        assert_eq!(json, r#"{"put":3000}"#);
    }
}
