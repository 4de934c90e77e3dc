//! Result classification.

use pushdeck_gateway::GatewayResponse;

use crate::outcome::DispatchOutcome;

/// Reason reported when a rejection carries none.
pub const UNKNOWN_REASON: &str = "Unknown";

/// Turn a gateway answer into `Accepted` or `Rejected`. Never fails.
pub fn classify(response: GatewayResponse) -> DispatchOutcome {
    if response.accepted {
        return DispatchOutcome::Accepted {
            apns_id: response.apns_id,
        };
    }
    DispatchOutcome::Rejected {
        apns_id: response.apns_id,
        reason: response
            .rejection_reason
            .unwrap_or_else(|| UNKNOWN_REASON.to_string()),
        invalidation_timestamp: response.token_invalidation_timestamp,
    }
}
