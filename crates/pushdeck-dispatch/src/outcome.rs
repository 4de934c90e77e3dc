//! Dispatch outcomes, the failure taxonomy, and the append-only result log.

use chrono::{DateTime, Utc};
use pushdeck_core::{EndpointError, InvalidCredentialError, Notification};
use pushdeck_gateway::{BuildError, GatewayError};
use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::DispatchTicket;

/// Local failure constructing a client.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The endpoint cannot be connected to.
    #[error("invalid gateway endpoint")]
    InvalidEndpoint(#[source] EndpointError),
    /// The gateway library rejected the configuration.
    #[error("failed to build gateway client")]
    Gateway(#[source] BuildError),
}

/// Failure while awaiting the gateway round trip.
#[derive(Debug, Error)]
#[error("notification was not delivered")]
pub struct ExecutionFailure {
    /// What the gateway client reported.
    #[from]
    pub cause: GatewayError,
}

/// Why a dispatch produced no gateway answer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The credential could not be resolved.
    #[error("credentials are unusable")]
    InvalidCredential(#[from] InvalidCredentialError),
    /// No client could be built.
    #[error(transparent)]
    ClientBuild(#[from] ClientBuildError),
    /// The round trip failed.
    #[error(transparent)]
    Execution(#[from] ExecutionFailure),
    /// The dispatch task panicked or was cancelled before finishing.
    #[error("dispatch aborted: {reason}")]
    Aborted {
        /// Panic message, or why the task was cancelled.
        reason: String,
    },
}

/// The single terminal result of one dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The gateway accepted the notification.
    Accepted {
        /// Gateway-assigned id.
        apns_id: Uuid,
    },
    /// The gateway answered and refused the notification.
    Rejected {
        /// Id of the rejected notification.
        apns_id: Uuid,
        /// Gateway reason string.
        reason: String,
        /// When the token became invalid, if the gateway said so.
        invalidation_timestamp: Option<DateTime<Utc>>,
    },
    /// No gateway answer was obtained.
    Failed {
        /// What went wrong.
        cause: DispatchError,
    },
}

impl DispatchOutcome {
    /// Wrap a failure.
    pub fn failed(cause: impl Into<DispatchError>) -> Self {
        Self::Failed {
            cause: cause.into(),
        }
    }

    /// Id of the notification, when the gateway answered.
    pub fn apns_id(&self) -> Option<Uuid> {
        match self {
            Self::Accepted { apns_id } | Self::Rejected { apns_id, .. } => Some(*apns_id),
            Self::Failed { .. } => None,
        }
    }

    /// True for [`DispatchOutcome::Accepted`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// True for [`DispatchOutcome::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One row of the result log.
#[derive(Debug)]
pub struct ResultEntry {
    /// Ticket the dispatch was submitted under.
    pub ticket: DispatchTicket,
    /// The notification that was sent.
    pub notification: Notification,
    /// What happened.
    pub outcome: DispatchOutcome,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only history of dispatch results, oldest first.
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: Vec<ResultEntry>,
}

impl ResultLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result and return the stored entry.
    pub fn append(
        &mut self,
        ticket: DispatchTicket,
        notification: Notification,
        outcome: DispatchOutcome,
    ) -> &ResultEntry {
        self.entries.push(ResultEntry {
            ticket,
            notification,
            outcome,
            recorded_at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose outcome is `Failed`.
    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_failed()).count()
    }
}
