//! Scriptable in-memory [`GatewayClient`] for tests.
//!
//! A [`StubGatewayClient`] answers every send with the same [`StubReply`].
//! Its [`StubRecorder`] is shared by clones and can be handed to several stub
//! clients, so a test can count sends and closes across a whole run and
//! check that no two sends overlapped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pushdeck_core::Notification;
use uuid::Uuid;

use crate::client::GatewayClient;
use crate::errors::GatewayError;
use crate::types::GatewayResponse;

/// What a stub answers to every send.
#[derive(Clone, Debug)]
pub enum StubReply {
    /// Accept with this id.
    Accept(Uuid),
    /// Reject with a reason and optional invalidation instant.
    Reject {
        /// Rejection reason.
        reason: String,
        /// Token invalidation instant.
        timestamp: Option<DateTime<Utc>>,
    },
    /// Fail with an I/O error carrying this message.
    Fail(String),
}

#[derive(Default)]
struct RecorderState {
    sends: AtomicUsize,
    closes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    sent: Mutex<Vec<Notification>>,
}

/// Counters observed by stub clients.
#[derive(Clone, Default)]
pub struct StubRecorder {
    state: Arc<RecorderState>,
}

impl StubRecorder {
    /// Create a fresh recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `send_notification` calls.
    pub fn sends(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Highest number of sends that were in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every notification sent, in call order.
    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// In-memory gateway client.
pub struct StubGatewayClient {
    reply: StubReply,
    delay: Option<Duration>,
    fail_close: bool,
    closed: AtomicBool,
    recorder: StubRecorder,
}

impl StubGatewayClient {
    /// A stub answering every send with `reply`.
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            delay: None,
            fail_close: false,
            closed: AtomicBool::new(false),
            recorder: StubRecorder::new(),
        }
    }

    /// Report into an existing recorder.
    #[must_use]
    pub fn with_recorder(mut self, recorder: StubRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    /// Sleep this long inside every send.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the first `close` fail.
    #[must_use]
    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// This client's recorder.
    pub fn recorder(&self) -> StubRecorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl GatewayClient for StubGatewayClient {
    async fn send_notification(
        &self,
        notification: &Notification,
    ) -> Result<GatewayResponse, GatewayError> {
        let state = &self.recorder.state;
        let _ = state.sends.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::Closed);
        }
        state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());

        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let _ = state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let sent_id = notification.apns_id.unwrap_or_else(Uuid::now_v7);
        match &self.reply {
            StubReply::Accept(id) => Ok(GatewayResponse::accepted(*id)),
            StubReply::Reject { reason, timestamp } => Ok(GatewayResponse::rejected(
                sent_id,
                reason.clone(),
                *timestamp,
            )),
            StubReply::Fail(message) => Err(GatewayError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                message.clone(),
            ))),
        }
    }

    async fn close(&self) -> Result<(), GatewayError> {
        let _ = self.recorder.state.closes.fetch_add(1, Ordering::SeqCst);
        let already_closed = self.closed.swap(true, Ordering::SeqCst);
        if self.fail_close && !already_closed {
            return Err(GatewayError::Io(std::io::Error::other("close failed")));
        }
        Ok(())
    }
}
