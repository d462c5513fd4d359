// ABOUTME: Side-channel diagnostics for outbound requests.
// ABOUTME: Observers see every request, response, and failure but cannot change the outcome.

use std::time::Duration;

use ulid::Ulid;

use waypoint_core::Method;

use crate::transport::TransportError;

/// Hook notified around each transport call. All methods default to no-ops.
pub trait TransportObserver: Send + Sync {
    fn on_request(&self, _request_id: Ulid, _method: Method, _url: &str) {}

    fn on_response(
        &self,
        _request_id: Ulid,
        _method: Method,
        _url: &str,
        _status: u16,
        _elapsed: Duration,
    ) {
    }

    fn on_error(&self, _request_id: Ulid, _error: &TransportError, _elapsed: Duration) {}
}

/// Emits a tracing event for every request, response, and error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TransportObserver for TracingObserver {
    fn on_request(&self, request_id: Ulid, method: Method, url: &str) {
        tracing::debug!(%request_id, %method, url, "api request");
    }

    fn on_response(
        &self,
        request_id: Ulid,
        method: Method,
        url: &str,
        status: u16,
        elapsed: Duration,
    ) {
        tracing::debug!(
            %request_id,
            %method,
            url,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "api response"
        );
    }

    fn on_error(&self, request_id: Ulid, error: &TransportError, elapsed: Duration) {
        // 404s are expected while probing route shapes; keep them quiet.
        if error.is_not_found() {
            tracing::debug!(%request_id, error = %error, "api miss");
        } else {
            tracing::warn!(
                %request_id,
                error = %error,
                elapsed_ms = elapsed.as_millis() as u64,
                "api error"
            );
        }
    }
}
