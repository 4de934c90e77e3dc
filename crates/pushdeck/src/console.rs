//! The interactive side of the console.
//!
//! [`Console`] owns the readiness gate, the scheduler handle, and the result
//! log. Completions are pulled off the scheduler's channel and appended to
//! the log here, on the task that owns the console, so the log has exactly
//! one writer.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pushdeck_core::{CredentialBundle, Endpoint, Notification, ReadinessGate};
use pushdeck_dispatch::{
    ClientFactory, CompletionEvent, DispatchRequest, DispatchScheduler, DispatchTicket, ResultLog,
    SchedulerConfig,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::render;

/// Console state for one session.
pub struct Console<W> {
    gate: ReadinessGate,
    endpoint: Endpoint,
    scheduler: DispatchScheduler,
    completions: mpsc::UnboundedReceiver<CompletionEvent>,
    log: ResultLog,
    pending: usize,
    header_printed: bool,
    out: W,
}

impl<W: Write> Console<W> {
    /// Start a console writing to `out`.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        config: SchedulerConfig,
        endpoint: Endpoint,
        out: W,
    ) -> Self {
        let (scheduler, completions) = DispatchScheduler::new(factory, config);
        Self {
            gate: ReadinessGate::new(),
            endpoint,
            scheduler,
            completions,
            log: ResultLog::new(),
            pending: 0,
            header_printed: false,
            out,
        }
    }

    /// Replace the credential; returns the ready flag.
    pub fn set_credentials(&mut self, credentials: Option<CredentialBundle>) -> bool {
        self.gate.set_credentials(credentials.map(Arc::new))
    }

    /// Replace the notification; returns the ready flag.
    pub fn set_notification(&mut self, notification: Option<Notification>) -> bool {
        self.gate.set_notification(notification)
    }

    /// Current gate.
    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    /// Queue the current notification. Refuses while not ready.
    ///
    /// Waits for room when the dispatch queue is full, recording whatever
    /// completes in the meantime.
    pub async fn submit(&mut self) -> Result<DispatchTicket> {
        let (Some(credentials), Some(notification), true) = (
            self.gate.credentials(),
            self.gate.notification(),
            self.gate.is_ready(),
        ) else {
            bail!("{}", render::readiness_report(self.gate.readiness()));
        };

        let request =
            DispatchRequest::new(self.endpoint.clone(), credentials.clone(), notification.clone());
        let ticket = self.scheduler.submit(request).await?;
        self.pending += 1;
        self.notification_sent(ticket)?;
        self.record_completed()?;
        Ok(ticket)
    }

    fn notification_sent(&mut self, ticket: DispatchTicket) -> Result<()> {
        let token = self
            .gate
            .notification()
            .map(|n| pushdeck_core::text::token_prefix(&n.token).to_string())
            .unwrap_or_default();
        info!(%ticket, endpoint = %self.endpoint, "notification submitted");
        writeln!(self.out, "queued {ticket} for {token}... via {}", self.endpoint)
            .context("failed to write output")
    }

    /// Wait until every submitted dispatch has completed.
    pub async fn wait_for_pending(&mut self) -> Result<()> {
        while self.pending > 0 {
            let Some(event) = self.completions.recv().await else {
                bail!("dispatch worker stopped with {} pending", self.pending);
            };
            self.record(event)?;
        }
        Ok(())
    }

    fn record_completed(&mut self) -> Result<()> {
        while let Ok(event) = self.completions.try_recv() {
            self.record(event)?;
        }
        Ok(())
    }

    fn record(&mut self, event: CompletionEvent) -> Result<()> {
        self.pending = self.pending.saturating_sub(1);
        if let CompletionEvent::Failed { ticket, cause, .. } = &event {
            writeln!(self.out, "{}", render::failure_report(*ticket, cause))
                .context("failed to write output")?;
        }

        let (ticket, notification, outcome) = event.into_parts();
        if !self.header_printed {
            writeln!(self.out, "{}", render::header()).context("failed to write output")?;
            self.header_printed = true;
        }
        let entry = self.log.append(ticket, notification, outcome);
        writeln!(self.out, "{}", render::format_row(&render::result_row(entry)))
            .context("failed to write output")
    }

    /// Results so far.
    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Drain outstanding work, stop the worker, and return the log and writer.
    pub async fn finish(mut self) -> Result<(ResultLog, W)> {
        self.wait_for_pending().await?;
        let Self {
            scheduler, log, out, ..
        } = self;
        scheduler.shutdown().await?;
        Ok((log, out))
    }
}
