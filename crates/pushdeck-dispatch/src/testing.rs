//! Stub client factory for tests of dispatch and of the console.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use pushdeck_core::Endpoint;
use pushdeck_gateway::{BuildError, GatewayClient, StubGatewayClient, StubRecorder, StubReply};

use crate::credentials::{AuthMode, ClientAuthConfig};
use crate::factory::ClientFactory;
use crate::outcome::ClientBuildError;

/// Hands out [`StubGatewayClient`]s that all report into one [`StubRecorder`].
pub struct StubClientFactory {
    reply: StubReply,
    delay: Option<Duration>,
    fail_close: bool,
    fail_build: bool,
    recorder: StubRecorder,
    builds: AtomicUsize,
    modes: Mutex<Vec<AuthMode>>,
}

impl StubClientFactory {
    /// Every client built answers with `reply`.
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            delay: None,
            fail_close: false,
            fail_build: false,
            recorder: StubRecorder::new(),
            builds: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        }
    }

    /// Clients sleep this long in every send.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Clients fail their first close.
    #[must_use]
    pub fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// `create` always fails.
    #[must_use]
    pub fn with_build_failure(mut self) -> Self {
        self.fail_build = true;
        self
    }

    /// Recorder shared by every client built.
    pub fn recorder(&self) -> StubRecorder {
        self.recorder.clone()
    }

    /// Number of successful `create` calls.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Auth modes requested, in call order.
    pub fn modes(&self) -> Vec<AuthMode> {
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientFactory for StubClientFactory {
    fn create(
        &self,
        _endpoint: &Endpoint,
        auth: &ClientAuthConfig<'_>,
    ) -> Result<Box<dyn GatewayClient>, ClientBuildError> {
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(auth.mode());
        if self.fail_build {
            return Err(ClientBuildError::Gateway(BuildError::Identity {
                reason: "scripted build failure".into(),
            }));
        }

        let _ = self.builds.fetch_add(1, Ordering::SeqCst);
        let mut client = StubGatewayClient::new(self.reply.clone()).with_recorder(self.recorder.clone());
        if let Some(delay) = self.delay {
            client = client.with_delay(delay);
        }
        if self.fail_close {
            client = client.with_close_failure();
        }
        Ok(Box::new(client))
    }
}
