//! Text rendering of results, failures, and readiness.

use std::error::Error;
use std::fmt::Write as _;

use pushdeck_core::text::{collapse_whitespace, truncate_str};
use pushdeck_core::{DeliveryPriority, Readiness};
use pushdeck_dispatch::{DispatchOutcome, DispatchTicket, ResultEntry};

const PAYLOAD_COLUMN_BYTES: usize = 60;

/// Column headings for [`result_row`].
pub const RESULT_COLUMNS: [&str; 9] = [
    "Ticket",
    "Topic",
    "Token",
    "Payload",
    "Collapse ID",
    "Priority",
    "Status",
    "Details",
    "APNs ID",
];

/// Human label for a priority.
pub fn priority_label(priority: DeliveryPriority) -> &'static str {
    match priority {
        DeliveryPriority::Immediate => "Immediate",
        DeliveryPriority::ConservePower => "Conserve power",
    }
}

/// Status column.
pub fn status_label(outcome: &DispatchOutcome) -> &'static str {
    match outcome {
        DispatchOutcome::Accepted { .. } => "Accepted",
        DispatchOutcome::Rejected { .. } => "Rejected",
        DispatchOutcome::Failed { .. } => "Failed",
    }
}

/// Details column.
pub fn details(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Accepted { .. } => "Accepted".to_string(),
        DispatchOutcome::Rejected {
            reason,
            invalidation_timestamp: None,
            ..
        } => reason.clone(),
        DispatchOutcome::Rejected {
            reason,
            invalidation_timestamp: Some(ts),
            ..
        } => format!("{reason} (token invalid as of {})", ts.to_rfc3339()),
        DispatchOutcome::Failed { cause } => cause.to_string(),
    }
}

/// One result row, in [`RESULT_COLUMNS`] order.
pub fn result_row(entry: &ResultEntry) -> [String; 9] {
    let n = &entry.notification;
    let payload = collapse_whitespace(&n.payload);
    [
        entry.ticket.to_string(),
        n.topic.clone(),
        n.token.clone(),
        truncate_str(&payload, PAYLOAD_COLUMN_BYTES).to_string(),
        n.collapse_id.clone().unwrap_or_default(),
        priority_label(n.priority).to_string(),
        status_label(&entry.outcome).to_string(),
        details(&entry.outcome),
        entry
            .outcome
            .apns_id()
            .map(|id| id.to_string())
            .unwrap_or_default(),
    ]
}

/// Tab-separated row text.
pub fn format_row(cells: &[String]) -> String {
    cells.join("\t")
}

/// Tab-separated header text.
pub fn header() -> String {
    RESULT_COLUMNS.join("\t")
}

/// Message plus every source, outermost first.
pub fn cause_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();
    while let Some(e) = source {
        chain.push(e.to_string());
        source = e.source();
    }
    chain
}

/// Multi-line failure report for one dispatch.
pub fn failure_report(ticket: DispatchTicket, error: &(dyn Error + 'static)) -> String {
    let chain = cause_chain(error);
    let mut report = format!("warning: dispatch {ticket} failed: {}", chain[0]);
    for cause in &chain[1..] {
        let _ = write!(report, "\n  caused by: {cause}");
    }
    report
}

/// Readiness summary: `ready`, or one line per missing input.
pub fn readiness_report(readiness: &Readiness) -> String {
    if readiness.is_ready() {
        return "ready".to_string();
    }
    let mut report = String::from("not ready:");
    for blocker in readiness.blockers() {
        let _ = write!(report, "\n  - {blocker}");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use pushdeck_core::{Notification, readiness};
    use pushdeck_dispatch::{ExecutionFailure, ResultLog};
    use pushdeck_gateway::GatewayError;
    use uuid::Uuid;

    const TOKEN: &str = "375c78f0411c3246ffcc85faae33438a080a854ad131ba55df9709fc259020ed";

    #[test]
    fn details_for_each_outcome() {
        let id = Uuid::now_v7();
        assert_eq!(details(&DispatchOutcome::Accepted { apns_id: id }), "Accepted");
        assert_eq!(
            details(&DispatchOutcome::Rejected {
                apns_id: id,
                reason: "BadDeviceToken".into(),
                invalidation_timestamp: None,
            }),
            "BadDeviceToken"
        );
        assert_eq!(
            details(&DispatchOutcome::Rejected {
                apns_id: id,
                reason: "Unregistered".into(),
                invalidation_timestamp: DateTime::from_timestamp(1_700_000_000, 0),
            }),
            "Unregistered (token invalid as of 2023-11-14T22:13:20+00:00)"
        );
    }

    #[test]
    fn row_collapses_payload_whitespace() {
        let mut log = ResultLog::new();
        let notification = Notification::new(TOKEN, "com.example.app", "{\n  \"aps\": {}\n}")
            .with_collapse_id("score")
            .with_priority(DeliveryPriority::ConservePower);
        let id = Uuid::now_v7();
        let entry = log.append(
            DispatchTicket::new(4),
            notification,
            DispatchOutcome::Accepted { apns_id: id },
        );

        let row = result_row(entry);
        assert_eq!(row[0], "#4");
        assert_eq!(row[3], r#"{ "aps": {} }"#);
        assert_eq!(row[4], "score");
        assert_eq!(row[5], "Conserve power");
        assert_eq!(row[6], "Accepted");
        assert_eq!(row[8], id.to_string());
        assert_eq!(format_row(&row).split('\t').count(), RESULT_COLUMNS.len());
    }

    #[test]
    fn failure_report_lists_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = ExecutionFailure::from(GatewayError::Io(io));
        let report = failure_report(DispatchTicket::new(2), &err);
        assert_eq!(
            report,
            "warning: dispatch #2 failed: notification was not delivered\n  \
             caused by: gateway I/O failed\n  \
             caused by: reset by peer"
        );
    }

    #[test]
    fn readiness_lists_blockers() {
        let report = readiness_report(&readiness::evaluate(None, None));
        assert_eq!(
            report,
            "not ready:\n  - credentials are required\n  - a notification is required"
        );
    }
}
