use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::client::error::{
    ApiClientError, ClientError, ClientTimeoutError, TimeoutCode, ValidationError,
};
use crate::client::hooks::Hooks;
use crate::client::transport::{PreparedRequest, TransportCode, TransportFailure};

/// The error payload fields the normalizer understands.
///
/// Each field is decoded on its own so that one odd field does not hide the
/// others.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default, rename = "type")]
    problem_type: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    detail: Option<Value>,
}

impl ErrorBody {
    fn parse(failure: &TransportFailure) -> Self {
        failure
            .response
            .as_ref()
            .and_then(|response| serde_json::from_slice(&response.body).ok())
            .unwrap_or_default()
    }

    fn message(&self) -> Option<String> {
        match self.message.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => Some(other.to_string()),
        }
    }

    fn problem_type(&self) -> Option<String> {
        self.problem_type
            .as_ref()
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    fn errors(&self) -> Vec<ValidationError> {
        self.errors
            .clone()
            .and_then(|errors| serde_json::from_value(errors).ok())
            .unwrap_or_default()
    }

    fn detail(&self) -> Option<String> {
        self.detail
            .as_ref()
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }
}

fn timeout_code(code: Option<TransportCode>) -> Option<TimeoutCode> {
    match code? {
        TransportCode::TimedOut => Some(TimeoutCode::TimedOut),
        TransportCode::ConnectionAborted => Some(TimeoutCode::ConnectionAborted),
        TransportCode::ConnectionReset | TransportCode::ConnectionRefused => None,
    }
}

/// Turns the transport failures left after recovery into typed errors.
///
/// Exactly one hook fires per failure, chosen from the error kind and status.
#[derive(Debug, Clone)]
pub(crate) struct ErrorNormalizer {
    hooks: Arc<Hooks>,
}

impl ErrorNormalizer {
    pub(crate) fn new(hooks: Arc<Hooks>) -> Self {
        Self { hooks }
    }

    pub(crate) fn normalize(
        &self,
        request: &PreparedRequest,
        failure: TransportFailure,
    ) -> ApiClientError {
        if let Some(code) = timeout_code(failure.code) {
            let error = ClientTimeoutError::new(code, failure.message);
            self.hooks.timeout_error(&error);
            return error.into();
        }

        let body = ErrorBody::parse(&failure);
        let status = failure.status();
        let message = format!(
            "{} {} <{} {}>",
            status.map_or_else(|| "unknown".to_string(), |status| status.to_string()),
            body.message().unwrap_or(failure.message),
            request.method.as_str().to_ascii_uppercase(),
            request.full_url(),
        );

        let error = ClientError::new(status, message)
            .with_problem_type(body.problem_type())
            .with_errors(body.errors())
            .with_detail(body.detail());

        match status {
            Some(500..) => self.hooks.error(&error),
            Some(400..500) => self.hooks.client_error(&error),
            _ => {}
        }

        error.into()
    }
}
