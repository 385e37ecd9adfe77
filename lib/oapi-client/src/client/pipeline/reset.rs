use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use tracing::warn;

use crate::client::transport::{
    PreparedRequest, RawResponse, Transport, TransportCode, TransportFailure,
};

/// Replays requests whose connection was reset by the peer.
///
/// The failed attempt counts as the first one: after `delay`, the request is
/// sent again at most `max_replays` times.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionResetReplay {
    delay: Duration,
    max_replays: usize,
}

impl Default for ConnectionResetReplay {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(50),
            max_replays: 1,
        }
    }
}

fn is_reset(failure: &TransportFailure) -> bool {
    failure.code == Some(TransportCode::ConnectionReset)
}

impl ConnectionResetReplay {
    pub(crate) async fn recover<T: Transport>(
        &self,
        transport: &T,
        request: &PreparedRequest,
        failure: TransportFailure,
    ) -> Result<RawResponse, TransportFailure> {
        if !is_reset(&failure) {
            return Err(failure);
        }

        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_replays);

        let mut original = Some(failure);
        let attempt = || {
            let pending = original.take();
            async move {
                match pending {
                    Some(failure) => Err(failure),
                    None => transport.send(request).await,
                }
            }
        };

        attempt
            .retry(backoff)
            .when(is_reset)
            .notify(|failure, delay| {
                warn!(url = request.full_url(), ?delay, "{}, replaying request", failure.message);
            })
            .await
    }
}
