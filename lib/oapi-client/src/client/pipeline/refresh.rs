use tracing::{debug, warn};

use crate::client::auth::TokenRetriever;
use crate::client::transport::{PreparedRequest, RawResponse, Transport, TransportFailure};

/// Statuses that trigger a token refresh by default.
pub const DEFAULT_REFRESH_STATUS_CODES: &[u16] = &[401];

/// Replays an authenticated request once with a refreshed token.
#[derive(Debug, Clone)]
pub(crate) struct RefreshRetry {
    refresher: Option<TokenRetriever>,
    status_codes: Vec<u16>,
}

impl RefreshRetry {
    pub(crate) fn new(refresher: Option<TokenRetriever>, status_codes: Vec<u16>) -> Self {
        Self {
            refresher,
            status_codes,
        }
    }

    fn should_refresh(&self, request: &PreparedRequest, failure: &TransportFailure) -> bool {
        self.refresher.is_some()
            && failure
                .response
                .as_ref()
                .is_some_and(|response| self.status_codes.contains(&response.status))
            && request.has_authorization()
            && !request.is_retried()
    }

    pub(crate) async fn recover<T: Transport>(
        &self,
        transport: &T,
        request: &mut PreparedRequest,
        failure: TransportFailure,
    ) -> Result<RawResponse, TransportFailure> {
        if !self.should_refresh(request, &failure) {
            return Err(failure);
        }
        let Some(refresher) = &self.refresher else {
            return Err(failure);
        };

        request.mark_retried();
        debug!(status = ?failure.status(), url = request.full_url(), "refreshing access token");

        let Some(token) = refresher.retrieve().await else {
            debug!("`refresh_access_token` returned nothing, keeping the original failure");
            return Err(failure);
        };
        match token.to_bearer_header() {
            Ok(header) => request.set_authorization(header),
            Err(error) => {
                warn!(%error, "refreshed token is not a valid header value");
                return Err(failure);
            }
        }

        transport.send(request).await
    }
}
