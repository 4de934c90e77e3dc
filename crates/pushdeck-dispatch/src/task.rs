//! One dispatch: resolve, build, send, await, close.

use std::sync::Arc;
use std::time::Duration;

use pushdeck_core::{CredentialBundle, Endpoint, Notification};
use pushdeck_gateway::GatewayClient;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::credentials::resolve;
use crate::factory::{ClientFactory, build_client};
use crate::outcome::{DispatchOutcome, ExecutionFailure};

/// Everything one dispatch needs. Lives only for that dispatch.
#[derive(Clone, Debug)]
pub struct DispatchRequest {
    /// Gateway to talk to.
    pub endpoint: Endpoint,
    /// Credential, shared read-only with the compose layer.
    pub credentials: Arc<CredentialBundle>,
    /// Notification to send. Never mutated by dispatch.
    pub notification: Notification,
}

impl DispatchRequest {
    /// Bundle the three inputs.
    pub fn new(
        endpoint: Endpoint,
        credentials: Arc<CredentialBundle>,
        notification: Notification,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            notification,
        }
    }
}

/// Run one dispatch to completion and return its single outcome.
///
/// A client that was built is closed exactly once, whatever the send
/// produced. Close is bounded by `close_timeout`; a close failure is logged
/// and does not change the outcome.
pub async fn dispatch(
    request: &DispatchRequest,
    factory: &dyn ClientFactory,
    close_timeout: Duration,
) -> DispatchOutcome {
    let auth = match resolve(&request.credentials) {
        Ok(auth) => auth,
        Err(e) => {
            warn!(error = %e, "credentials rejected, no client built");
            return DispatchOutcome::failed(e);
        }
    };

    let client = match build_client(factory, &request.endpoint, &auth) {
        Ok(client) => client,
        Err(e) => {
            warn!(endpoint = %request.endpoint, error = %e, "client build failed");
            return DispatchOutcome::failed(e);
        }
    };
    debug!(endpoint = %request.endpoint, mode = ?auth.mode(), "client built");

    let result = client.send_notification(&request.notification).await;
    close_client(client.as_ref(), close_timeout).await;

    let outcome = match result {
        Ok(response) => classify(response),
        Err(e) => DispatchOutcome::failed(ExecutionFailure::from(e)),
    };
    info!(
        outcome = outcome.kind(),
        apns_id = ?outcome.apns_id(),
        "dispatch finished"
    );
    outcome
}

async fn close_client(client: &dyn GatewayClient, close_timeout: Duration) {
    match tokio::time::timeout(close_timeout, client.close()).await {
        Ok(Ok(())) => debug!("client closed"),
        Ok(Err(e)) => warn!(error = %e, "failed to close gateway client"),
        Err(_) => warn!(
            timeout_ms = u64::try_from(close_timeout.as_millis()).unwrap_or(u64::MAX),
            "timed out closing gateway client"
        ),
    }
}
