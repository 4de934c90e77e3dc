//! Single-worker dispatch scheduler.
//!
//! Requests go through a bounded MPSC channel to one consumer task, so
//! dispatches run strictly one at a time in submission order. Each finished
//! dispatch produces exactly one [`CompletionEvent`] on the completion
//! channel returned by [`DispatchScheduler::new`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pushdeck_core::Notification;
use pushdeck_core::text::token_prefix;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, info_span, warn};

use crate::factory::ClientFactory;
use crate::outcome::{DispatchError, DispatchOutcome};
use crate::task::{DispatchRequest, dispatch};

/// Identifies one submitted dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DispatchTicket(u64);

impl DispatchTicket {
    /// Wrap a raw ticket number.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw ticket number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal event for one submitted dispatch.
#[derive(Debug)]
pub enum CompletionEvent {
    /// The gateway answered (accepted or rejected).
    Succeeded {
        /// Ticket returned by `submit`.
        ticket: DispatchTicket,
        /// The notification that was sent.
        notification: Notification,
        /// `Accepted` or `Rejected`.
        outcome: DispatchOutcome,
    },
    /// No gateway answer was obtained.
    Failed {
        /// Ticket returned by `submit`.
        ticket: DispatchTicket,
        /// The notification that was attempted.
        notification: Notification,
        /// Full failure cause.
        cause: DispatchError,
    },
}

impl CompletionEvent {
    fn new(ticket: DispatchTicket, notification: Notification, outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Failed { cause } => Self::Failed {
                ticket,
                notification,
                cause,
            },
            outcome => Self::Succeeded {
                ticket,
                notification,
                outcome,
            },
        }
    }

    /// Ticket this event completes.
    pub fn ticket(&self) -> DispatchTicket {
        match self {
            Self::Succeeded { ticket, .. } | Self::Failed { ticket, .. } => *ticket,
        }
    }

    /// Split into parts, folding a failure back into [`DispatchOutcome::Failed`].
    pub fn into_parts(self) -> (DispatchTicket, Notification, DispatchOutcome) {
        match self {
            Self::Succeeded {
                ticket,
                notification,
                outcome,
            } => (ticket, notification, outcome),
            Self::Failed {
                ticket,
                notification,
                cause,
            } => (ticket, notification, DispatchOutcome::Failed { cause }),
        }
    }
}

/// Submission or shutdown failure.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The queue is at capacity.
    #[error("dispatch queue is full ({capacity} pending)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
    /// The worker is gone.
    #[error("dispatch worker panicked or exited")]
    WorkerGone,
}

/// Scheduler tuning.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of queued dispatches.
    pub queue_capacity: usize,
    /// Upper bound on closing each client.
    pub close_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            close_timeout: Duration::from_secs(5),
        }
    }
}

struct Job {
    ticket: DispatchTicket,
    request: DispatchRequest,
}

/// Serializes dispatches onto a single background worker.
pub struct DispatchScheduler {
    tx: mpsc::Sender<Job>,
    worker_handle: JoinHandle<()>,
    next_ticket: AtomicU64,
    capacity: usize,
}

impl DispatchScheduler {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        config: SchedulerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CompletionEvent>) {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let worker_handle = tokio::spawn(dispatch_worker(
            rx,
            factory,
            config.close_timeout,
            completion_tx,
        ));

        let scheduler = Self {
            tx,
            worker_handle,
            next_ticket: AtomicU64::new(1),
            capacity,
        };
        (scheduler, completion_rx)
    }

    /// Queue a dispatch, waiting for room while the queue is full.
    ///
    /// Never waits for the dispatch itself.
    pub async fn submit(&self, request: DispatchRequest) -> Result<DispatchTicket, SchedulerError> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| SchedulerError::WorkerGone)?;
        Ok(self.enqueue(permit, request))
    }

    /// Queue a dispatch if there is room right now.
    pub fn try_submit(&self, request: DispatchRequest) -> Result<DispatchTicket, SchedulerError> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => SchedulerError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(()) => SchedulerError::WorkerGone,
        })?;
        Ok(self.enqueue(permit, request))
    }

    fn enqueue(&self, permit: mpsc::Permit<'_, Job>, request: DispatchRequest) -> DispatchTicket {
        // Tickets are drawn only once a slot is held, so refusals leave no gaps.
        let ticket = DispatchTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst));
        permit.send(Job { ticket, request });
        debug!(%ticket, "dispatch queued");
        ticket
    }

    /// Stop accepting work, let queued and in-flight dispatches finish, and
    /// wait for the worker to exit.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        drop(self.tx);
        self.worker_handle
            .await
            .map_err(|_| SchedulerError::WorkerGone)
    }
}

/// Background worker that runs dispatches sequentially.
///
/// Each dispatch runs in its own task, awaited before the next is received,
/// so a panicking client or factory costs one outcome and not the worker.
async fn dispatch_worker(
    mut rx: mpsc::Receiver<Job>,
    factory: Arc<dyn ClientFactory>,
    close_timeout: Duration,
    completions: mpsc::UnboundedSender<CompletionEvent>,
) {
    while let Some(Job { ticket, request }) = rx.recv().await {
        let notification = request.notification.clone();
        let span = info_span!(
            "dispatch",
            ticket = ticket.get(),
            topic = %request.notification.topic,
            token = token_prefix(&request.notification.token),
        );
        let factory = Arc::clone(&factory);
        let task = tokio::spawn(
            async move { dispatch(&request, factory.as_ref(), close_timeout).await }
                .instrument(span),
        );

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = abort_reason(e);
                warn!(%ticket, %reason, "dispatch task aborted");
                DispatchOutcome::failed(DispatchError::Aborted { reason })
            }
        };

        let event = CompletionEvent::new(ticket, notification, outcome);
        if completions.send(event).is_err() {
            debug!(%ticket, "completion receiver dropped");
        }
    }
    debug!("dispatch worker stopped");
}

fn abort_reason(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned());
            match message {
                Some(message) => format!("task panicked: {message}"),
                None => "task panicked".to_string(),
            }
        }
        Err(_) => "task was cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubClientFactory;
    use assert_matches::assert_matches;
    use pushdeck_core::logging::capture_logs;
    use pushdeck_core::{Endpoint, SigningKeyCredential};
    use pushdeck_gateway::StubReply;
    use uuid::Uuid;

    fn request(token: &str) -> DispatchRequest {
        DispatchRequest::new(
            Endpoint::development(),
            Arc::new(SigningKeyCredential::new("key", "KID", "TEAM").into()),
            Notification::new(token, "com.example.app", "{}"),
        )
    }

    fn tokens(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i:064x}")).collect()
    }

    #[tokio::test]
    async fn n_submissions_produce_n_ordered_completions() {
        let factory = Arc::new(
            StubClientFactory::new(StubReply::Accept(Uuid::now_v7()))
                .with_delay(Duration::from_millis(5)),
        );
        let (scheduler, mut completions) =
            DispatchScheduler::new(factory.clone(), SchedulerConfig::default());

        let tokens = tokens(8);
        let mut tickets = Vec::new();
        for token in &tokens {
            tickets.push(scheduler.submit(request(token)).await.unwrap());
        }
        scheduler.shutdown().await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = completions.recv().await {
            let (ticket, notification, outcome) = event.into_parts();
            assert!(outcome.is_accepted());
            seen.push((ticket, notification.token));
        }

        let expected: Vec<_> = tickets.into_iter().zip(tokens).collect();
        assert_eq!(seen, expected);

        let recorder = factory.recorder();
        assert_eq!(recorder.sends(), 8);
        assert_eq!(recorder.closes(), 8);
        assert_eq!(recorder.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn tickets_increase() {
        let factory = Arc::new(StubClientFactory::new(StubReply::Accept(Uuid::now_v7())));
        let (scheduler, _completions) = DispatchScheduler::new(factory, SchedulerConfig::default());
        let a = scheduler.submit(request("aa")).await.unwrap();
        let b = scheduler.submit(request("bb")).await.unwrap();
        assert!(b > a);
        assert_eq!(a.to_string(), "#1");
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn failures_arrive_on_failure_variant() {
        let factory = Arc::new(StubClientFactory::new(StubReply::Fail("reset".into())));
        let (scheduler, mut completions) =
            DispatchScheduler::new(factory.clone(), SchedulerConfig::default());
        let ticket = scheduler.submit(request("aa")).await.unwrap();
        scheduler.shutdown().await.unwrap();

        let event = completions.recv().await.unwrap();
        assert_eq!(event.ticket(), ticket);
        assert_matches!(event, CompletionEvent::Failed { cause: DispatchError::Execution(_), .. });
        assert!(completions.recv().await.is_none());
        assert_eq!(factory.recorder().closes(), 1);
    }

    #[tokio::test]
    async fn full_queue_rejects_try_submit_without_burning_a_ticket() {
        let factory = Arc::new(StubClientFactory::new(StubReply::Accept(Uuid::now_v7())));
        let config = SchedulerConfig {
            queue_capacity: 1,
            ..SchedulerConfig::default()
        };
        let (scheduler, mut completions) = DispatchScheduler::new(factory, config);

        // The worker has not been polled yet on this current-thread runtime.
        let first = scheduler.try_submit(request("aa")).unwrap();
        assert_matches!(
            scheduler.try_submit(request("bb")),
            Err(SchedulerError::QueueFull { capacity: 1 })
        );
        let second = scheduler.submit(request("cc")).await.unwrap();
        assert_eq!((first.get(), second.get()), (1, 2));

        scheduler.shutdown().await.unwrap();
        assert_eq!(completions.recv().await.unwrap().ticket(), first);
        assert_eq!(completions.recv().await.unwrap().ticket(), second);
        assert!(completions.recv().await.is_none());
    }

    #[tokio::test]
    async fn submit_waits_for_room_instead_of_dropping() {
        let factory = Arc::new(
            StubClientFactory::new(StubReply::Accept(Uuid::now_v7()))
                .with_delay(Duration::from_millis(2)),
        );
        let config = SchedulerConfig {
            queue_capacity: 2,
            ..SchedulerConfig::default()
        };
        let (scheduler, mut completions) = DispatchScheduler::new(factory.clone(), config);

        let mut tickets = Vec::new();
        for token in tokens(10) {
            tickets.push(scheduler.submit(request(&token)).await.unwrap());
        }
        scheduler.shutdown().await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = completions.recv().await {
            seen.push(event.ticket());
        }
        assert_eq!(seen, tickets);
        assert_eq!(
            tickets.iter().map(|t| t.get()).collect::<Vec<_>>(),
            (1..=10).collect::<Vec<_>>()
        );
        assert_eq!(factory.recorder().max_in_flight(), 1);
    }

    /// Panics on the second build, otherwise delegates.
    struct PanicOnSecondBuild {
        inner: StubClientFactory,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl ClientFactory for PanicOnSecondBuild {
        fn create(
            &self,
            endpoint: &pushdeck_core::Endpoint,
            auth: &crate::credentials::ClientAuthConfig<'_>,
        ) -> Result<Box<dyn pushdeck_gateway::GatewayClient>, crate::outcome::ClientBuildError>
        {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("factory exploded");
            }
            self.inner.create(endpoint, auth)
        }
    }

    #[tokio::test]
    async fn panic_in_one_dispatch_fails_only_that_ticket() {
        let factory = Arc::new(PanicOnSecondBuild {
            inner: StubClientFactory::new(StubReply::Accept(Uuid::now_v7())),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let (scheduler, mut completions) =
            DispatchScheduler::new(factory, SchedulerConfig::default());
        for token in tokens(3) {
            let _ = scheduler.submit(request(&token)).await.unwrap();
        }
        scheduler.shutdown().await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = completions.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_matches!(events[0], CompletionEvent::Succeeded { .. });
        assert_matches!(
            &events[1],
            CompletionEvent::Failed { cause: DispatchError::Aborted { reason }, .. }
                if reason == "task panicked: factory exploded"
        );
        assert_matches!(events[2], CompletionEvent::Succeeded { .. });
    }

    #[tokio::test]
    async fn shutdown_finishes_queued_work() {
        let factory = Arc::new(
            StubClientFactory::new(StubReply::Accept(Uuid::now_v7()))
                .with_delay(Duration::from_millis(20)),
        );
        let (scheduler, mut completions) =
            DispatchScheduler::new(factory.clone(), SchedulerConfig::default());
        for token in tokens(3) {
            let _ = scheduler.submit(request(&token)).await.unwrap();
        }
        scheduler.shutdown().await.unwrap();

        let mut count = 0;
        while completions.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(factory.recorder().closes(), 3);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_stop_worker() {
        let factory = Arc::new(StubClientFactory::new(StubReply::Accept(Uuid::now_v7())));
        let (scheduler, completions) =
            DispatchScheduler::new(factory.clone(), SchedulerConfig::default());
        drop(completions);
        let _ = scheduler.submit(request("aa")).await.unwrap();
        let _ = scheduler.submit(request("bb")).await.unwrap();
        scheduler.shutdown().await.unwrap();
        assert_eq!(factory.recorder().sends(), 2);
    }

    #[tokio::test]
    async fn dispatch_runs_in_span() {
        let (logs, _guard) = capture_logs();
        let factory = Arc::new(StubClientFactory::new(StubReply::Accept(Uuid::now_v7())));
        let (scheduler, _completions) = DispatchScheduler::new(factory, SchedulerConfig::default());
        let _ = scheduler.submit(request("abcdef0123456789")).await.unwrap();
        scheduler.shutdown().await.unwrap();

        assert!(logs.has_span("dispatch"));
        assert!(logs.has_message("dispatch finished"));
    }
}
