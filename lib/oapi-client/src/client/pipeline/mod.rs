//! The request pipeline.
//!
//! A call goes through three ordered steps:
//!
//! 1. request stages adjust the [`PreparedRequest`] before it is sent
//!    (per-method timeouts, request logging),
//! 2. the [`Transport`] sends it,
//! 3. on failure, recovery stages may replay it (token refresh, connection
//!    reset), then whatever failure remains is normalized into an
//!    [`ApiClientError`].
//!
//! Replays go straight to the transport: request stages run once per call.

use std::sync::Arc;

use tracing::debug;

use super::error::ApiClientError;
use super::hooks::{Hooks, RequestInfo};
use super::transport::{PreparedRequest, RawResponse, Transport, TransportFailure};

mod normalize;
mod refresh;
mod reset;
mod timeout;

pub(crate) use self::normalize::ErrorNormalizer;
pub use self::refresh::DEFAULT_REFRESH_STATUS_CODES;
pub(crate) use self::refresh::RefreshRetry;
pub(crate) use self::reset::ConnectionResetReplay;
pub use self::timeout::{DEFAULT_REQUEST_TIMEOUT, MethodTimeouts, Timeout};
pub(crate) use self::timeout::TimeoutPolicy;

/// Reports each outgoing request to the `on_request` hook.
#[derive(Debug, Clone)]
pub(crate) struct RequestLog {
    hooks: Arc<Hooks>,
}

impl RequestLog {
    pub(crate) fn new(hooks: Arc<Hooks>) -> Self {
        Self { hooks }
    }

    fn apply(&self, request: &PreparedRequest) {
        let info = RequestInfo {
            method: request.method.clone(),
            url: request.url(),
        };
        self.hooks.request(&info);
    }
}

/// Runs before the request is sent.
#[derive(Debug, Clone)]
pub(crate) enum RequestStage {
    Timeout(TimeoutPolicy),
    Log(RequestLog),
}

impl RequestStage {
    fn apply(&self, request: &mut PreparedRequest) {
        match self {
            Self::Timeout(policy) => policy.apply(request),
            Self::Log(log) => log.apply(request),
        }
    }
}

/// Runs when the transport fails, in registration order.
#[derive(Debug, Clone)]
pub(crate) enum RecoveryStage {
    RefreshToken(RefreshRetry),
    ConnectionReset(ConnectionResetReplay),
}

impl RecoveryStage {
    async fn recover<T: Transport>(
        &self,
        transport: &T,
        request: &mut PreparedRequest,
        failure: TransportFailure,
    ) -> Result<RawResponse, TransportFailure> {
        match self {
            Self::RefreshToken(stage) => stage.recover(transport, request, failure).await,
            Self::ConnectionReset(stage) => stage.recover(transport, request, failure).await,
        }
    }
}

/// The ordered stages wrapped around every transport call.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    request_stages: Vec<RequestStage>,
    recovery_stages: Vec<RecoveryStage>,
    normalizer: ErrorNormalizer,
}

impl Pipeline {
    pub(crate) fn new(normalizer: ErrorNormalizer) -> Self {
        Self {
            request_stages: Vec::new(),
            recovery_stages: Vec::new(),
            normalizer,
        }
    }

    #[must_use]
    pub(crate) fn with_request_stage(mut self, stage: RequestStage) -> Self {
        self.request_stages.push(stage);
        self
    }

    #[must_use]
    pub(crate) fn with_recovery_stage(mut self, stage: RecoveryStage) -> Self {
        self.recovery_stages.push(stage);
        self
    }

    /// Sends `request` through every stage.
    ///
    /// # Errors
    ///
    /// Returns the normalized error when the request still fails after recovery.
    pub(crate) async fn execute<T: Transport>(
        &self,
        transport: &T,
        mut request: PreparedRequest,
    ) -> Result<RawResponse, ApiClientError> {
        for stage in &self.request_stages {
            stage.apply(&mut request);
        }

        let mut outcome = transport.send(&request).await;
        for stage in &self.recovery_stages {
            outcome = match outcome {
                Ok(response) => return Ok(response),
                Err(failure) => stage.recover(transport, &mut request, failure).await,
            };
        }

        outcome.map_err(|failure| {
            debug!(status = ?failure.status(), code = ?failure.code, "request failed");
            self.normalizer.normalize(&request, failure)
        })
    }
}
