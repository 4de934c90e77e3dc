//! Readiness gate: may a dispatch be started with the current inputs?
//!
//! [`evaluate`] is a pure function of the current credential and
//! notification. [`ReadinessGate`] holds the two inputs for a presentation
//! layer and recomputes on every change, so the flag never depends on the
//! order in which the inputs arrived.

use std::fmt;
use std::sync::Arc;

use crate::credentials::CredentialBundle;
use crate::errors::{InvalidCredentialError, NotificationError};
use crate::notification::Notification;

/// A reason dispatch is not allowed yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Blocker {
    /// No credential has been chosen.
    MissingCredentials,
    /// The chosen credential is unusable.
    InvalidCredentials(InvalidCredentialError),
    /// No notification has been composed.
    MissingNotification,
    /// The composed notification is invalid.
    InvalidNotification(NotificationError),
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => f.write_str("credentials are required"),
            Self::InvalidCredentials(e) => write!(f, "credentials are invalid: {e}"),
            Self::MissingNotification => f.write_str("a notification is required"),
            Self::InvalidNotification(e) => write!(f, "notification is invalid: {e}"),
        }
    }
}

/// Result of evaluating the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readiness {
    blockers: Vec<Blocker>,
}

impl Readiness {
    /// True when nothing blocks dispatch.
    pub fn is_ready(&self) -> bool {
        self.blockers.is_empty()
    }

    /// Everything currently blocking dispatch, credentials first.
    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }
}

/// Evaluate readiness for the given inputs.
pub fn evaluate(
    credentials: Option<&CredentialBundle>,
    notification: Option<&Notification>,
) -> Readiness {
    let mut blockers = Vec::new();

    match credentials {
        None => blockers.push(Blocker::MissingCredentials),
        Some(bundle) => {
            if let Err(e) = bundle.validate() {
                blockers.push(Blocker::InvalidCredentials(e));
            }
        }
    }

    match notification {
        None => blockers.push(Blocker::MissingNotification),
        Some(n) => {
            if let Err(e) = n.validate() {
                blockers.push(Blocker::InvalidNotification(e));
            }
        }
    }

    Readiness { blockers }
}

/// Shorthand for `evaluate(..).is_ready()`.
pub fn is_ready(
    credentials: Option<&CredentialBundle>,
    notification: Option<&Notification>,
) -> bool {
    evaluate(credentials, notification).is_ready()
}

/// Holds the current compose inputs and the derived ready flag.
#[derive(Debug)]
pub struct ReadinessGate {
    credentials: Option<Arc<CredentialBundle>>,
    notification: Option<Notification>,
    readiness: Readiness,
}

impl ReadinessGate {
    /// An empty gate (not ready).
    pub fn new() -> Self {
        Self {
            credentials: None,
            notification: None,
            readiness: evaluate(None, None),
        }
    }

    /// Replace the current credential and return the new ready flag.
    pub fn set_credentials(&mut self, credentials: Option<Arc<CredentialBundle>>) -> bool {
        self.credentials = credentials;
        self.recompute()
    }

    /// Replace the current notification and return the new ready flag.
    pub fn set_notification(&mut self, notification: Option<Notification>) -> bool {
        self.notification = notification;
        self.recompute()
    }

    /// Current ready flag.
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Current evaluation, including blockers.
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Current credential.
    pub fn credentials(&self) -> Option<&Arc<CredentialBundle>> {
        self.credentials.as_ref()
    }

    /// Current notification.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    fn recompute(&mut self) -> bool {
        self.readiness = evaluate(self.credentials.as_deref(), self.notification.as_ref());
        self.readiness.is_ready()
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}
