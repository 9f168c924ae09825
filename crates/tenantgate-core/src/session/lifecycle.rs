//! Session lifecycle: start, stop, restart.
//!
//! State machine:
//!
//! ```text
//!  Stopped/Disconnected/Failed --start--> Starting --ok--> Connected
//!                                            |--error/timeout--> Failed
//!                                            |--stop--> Stopped
//!  any --stop--> Stopped
//!  any --restart--> Starting --> Connected | Failed   (never Stopped)
//! ```
//!
//! Every operation holds the session's lifecycle mutex for its full
//! duration, including the connect attempt. A `stop` arriving while a start
//! is connecting first cancels the attempt through its `CancellationToken`,
//! then takes the mutex, so it never waits for the start timeout.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tenantgate_types::error::{SessionError, TransportError};
use tenantgate_types::session::SessionState;
use tenantgate_types::webhook::{WebhookEvent, WebhookEventKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Lifecycle, Session};
use crate::sink::EventSink;

/// Result of a successful `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new link was established.
    Connected,
    /// The session was already starting or connected; nothing was touched.
    AlreadyActive(SessionState),
}

/// Result of `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

impl Session {
    /// Establish the transport link.
    ///
    /// Valid from `Stopped`, `Disconnected` and `Failed`. From `Starting` or
    /// `Connected` it is a no-op reporting the current state. A failed or
    /// timed-out attempt leaves the session `Failed` with the cause recorded.
    pub async fn start(&self) -> Result<StartOutcome, SessionError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let current = self.state();
        if !current.can_start() {
            info!(token = %self.fingerprint, state = %current, "start ignored, session already active");
            return Ok(StartOutcome::AlreadyActive(current));
        }
        self.connect_locked(&mut lifecycle).await?;
        Ok(StartOutcome::Connected)
    }

    /// Tear down the link and move to `Stopped`, recording `reason`.
    ///
    /// Valid from any state and idempotent. Cancels an in-flight start.
    pub async fn stop(&self, reason: &str) -> StopOutcome {
        let cancelled_start = self.cancel_pending_start(reason);
        let mut lifecycle = self.lifecycle.lock().await;

        let previous = self.state();
        if let Some(link) = lifecycle.link.take() {
            link.close();
        }
        if previous == SessionState::Stopped {
            return if cancelled_start {
                StopOutcome::Stopped
            } else {
                StopOutcome::AlreadyStopped
            };
        }

        self.record_stop_reason(reason);
        self.set_state(SessionState::Stopped, None);
        info!(token = %self.fingerprint, reason, "session stopped");
        if previous == SessionState::Connected {
            self.emit_lifecycle(WebhookEventKind::Disconnected, Some(reason.to_string()));
        }
        StopOutcome::Stopped
    }

    /// Stop with reason `restart` and start again as one serialized
    /// operation. The session goes straight to `Starting`; `Stopped` is
    /// never observable in between.
    pub async fn restart(&self) -> Result<(), SessionError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let previous = self.state();
        if let Some(link) = lifecycle.link.take() {
            link.close();
        }
        self.record_stop_reason("restart");
        if previous == SessionState::Connected {
            self.emit_lifecycle(WebhookEventKind::Disconnected, Some("restart".to_string()));
        }
        self.connect_locked(&mut lifecycle).await
    }

    /// Run one connect attempt. Caller holds the lifecycle mutex.
    async fn connect_locked(&self, lifecycle: &mut Lifecycle) -> Result<(), SessionError> {
        if let Some(stale) = lifecycle.link.take() {
            stale.close();
        }

        self.link_generation.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *self.pending_start() = Some(cancel.clone());
        self.set_state(SessionState::Starting, None);

        let result = match self.sink() {
            Some(sink) => {
                let attempt = tokio::time::timeout(
                    self.start_timeout,
                    self.connector.connect(&self.token, sink),
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(SessionError::Cancelled),
                    outcome = attempt => match outcome {
                        Ok(Ok(link)) => Ok(link),
                        Ok(Err(err)) => Err(SessionError::TransportFailure(err)),
                        Err(_elapsed) => Err(SessionError::Timeout(self.start_timeout)),
                    },
                }
            }
            None => Err(SessionError::TransportFailure(TransportError::Closed)),
        };
        self.pending_start().take();

        match result {
            Ok(link) => {
                lifecycle.link = Some(link);
                self.set_state(SessionState::Connected, None);
                self.emit_lifecycle(WebhookEventKind::Connected, None);
                Ok(())
            }
            Err(SessionError::Cancelled) => {
                self.set_state(SessionState::Stopped, None);
                info!(token = %self.fingerprint, "start cancelled by stop");
                Err(SessionError::Cancelled)
            }
            Err(err) => {
                warn!(token = %self.fingerprint, error = %err, "session start failed");
                self.set_state(SessionState::Failed, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Cancel the in-flight start attempt, recording `reason` for it.
    fn cancel_pending_start(&self, reason: &str) -> bool {
        let Some(cancel) = self.pending_start().take() else {
            return false;
        };
        self.record_stop_reason(reason);
        cancel.cancel();
        true
    }

    fn pending_start(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.pending_start
            .lock()
            .expect("session pending start lock poisoned")
    }

    fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.this.upgrade().map(|session| session as Arc<dyn EventSink>)
    }

    pub(super) fn emit_lifecycle(&self, kind: WebhookEventKind, reason: Option<String>) {
        self.emit(WebhookEvent::lifecycle(kind, self.status(), reason));
    }

    pub(super) fn link_generation(&self) -> u64 {
        self.link_generation.load(Ordering::SeqCst)
    }

    /// Close the link after a remote logout. See [`EventSink::logged_out`].
    ///
    /// `generation` is the link generation when the logout was reported; a
    /// logout from a link that has since been replaced is ignored.
    pub(super) async fn handle_logged_out(&self, generation: u64, reason: String) {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.link_generation() != generation {
            info!(token = %self.fingerprint, reason = %reason, "logout from replaced link ignored");
            return;
        }
        if let Some(link) = lifecycle.link.take() {
            link.close();
        }

        if self.state() == SessionState::Stopped {
            info!(token = %self.fingerprint, reason = %reason, "logout after stop");
            return;
        }
        warn!(token = %self.fingerprint, reason = %reason, "session logged out remotely");
        self.set_state(SessionState::Failed, Some(format!("logged out: {reason}")));
        self.emit_lifecycle(WebhookEventKind::LoggedOut, Some(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tenantgate_types::toggle::ToggleValues;

    use crate::testing::{ConnectPlan, fixture, fixture_with, wait_until};

    #[tokio::test]
    async fn start_connects_and_emits_connected() {
        let fx = fixture("tenant-a");

        let outcome = fx.session.start().await.unwrap();

        assert_eq!(outcome, StartOutcome::Connected);
        assert_eq!(fx.session.state(), SessionState::Connected);
        assert_eq!(fx.connector.connects(), 1);
        wait_until(|| fx.sender.all().len() == 1).await;
        assert_eq!(fx.sender.all()[0].event, WebhookEventKind::Connected);
    }

    #[tokio::test]
    async fn start_on_connected_is_noop() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();

        let outcome = fx.session.start().await.unwrap();

        assert_eq!(outcome, StartOutcome::AlreadyActive(SessionState::Connected));
        assert_eq!(fx.connector.connects(), 1);
        assert_eq!(fx.connector.closes(), 0);
    }

    #[tokio::test]
    async fn start_failure_records_cause() {
        let fx = fixture("tenant-a");
        fx.connector
            .plan(ConnectPlan::Fail(TransportError::Unpaired("scan qr".to_string())));

        let err = fx.session.start().await.unwrap_err();

        assert!(matches!(err, SessionError::TransportFailure(_)));
        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Failed);
        assert_eq!(
            status.last_failure.as_deref(),
            Some("start failed: account is not paired: scan qr")
        );

        // Failed is a valid start state
        assert_eq!(fx.session.start().await.unwrap(), StartOutcome::Connected);
        assert!(fx.session.status().last_failure.is_none());
    }

    #[tokio::test]
    async fn start_times_out_to_failed() {
        let fx = fixture_with("tenant-a", ToggleValues::default(), Duration::from_millis(50));
        fx.connector.plan(ConnectPlan::Hang);

        let err = fx.session.start().await.unwrap_err();

        assert_eq!(err, SessionError::Timeout(Duration::from_millis(50)));
        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Failed);
        assert!(status.last_failure.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let fx = fixture("tenant-a");
        assert_eq!(fx.session.stop("command").await, StopOutcome::AlreadyStopped);

        fx.session.start().await.unwrap();
        assert_eq!(fx.session.stop("command").await, StopOutcome::Stopped);
        assert_eq!(fx.session.stop("command").await, StopOutcome::AlreadyStopped);

        assert_eq!(fx.connector.closes(), 1);
        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Stopped);
        assert_eq!(status.last_stop_reason.as_deref(), Some("command"));
    }

    #[tokio::test]
    async fn stop_emits_disconnected_with_reason() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        fx.session.stop("maintenance").await;

        wait_until(|| fx.sender.all().len() == 2).await;
        let last = fx.sender.all().pop().unwrap();
        assert_eq!(last.event, WebhookEventKind::Disconnected);
        assert_eq!(last.reason.as_deref(), Some("maintenance"));
    }

    #[tokio::test]
    async fn stop_cancels_hanging_start() {
        let fx = fixture("tenant-a");
        fx.connector.plan(ConnectPlan::Hang);

        let session = Arc::clone(&fx.session);
        let start = tokio::spawn(async move { session.start().await });
        wait_until(|| fx.session.state() == SessionState::Starting).await;

        let outcome = tokio::time::timeout(Duration::from_secs(1), fx.session.stop("command"))
            .await
            .unwrap();

        assert_eq!(outcome, StopOutcome::Stopped);
        assert_eq!(start.await.unwrap(), Err(SessionError::Cancelled));
        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Stopped);
        assert_eq!(status.last_stop_reason.as_deref(), Some("command"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_start_and_stop_settle_consistently() {
        for _ in 0..20 {
            let fx = fixture("tenant-a");
            fx.connector.plan(ConnectPlan::Delay(Duration::from_millis(5)));

            let starter = Arc::clone(&fx.session);
            let stopper = Arc::clone(&fx.session);
            let (_, _) = tokio::join!(
                tokio::spawn(async move { starter.start().await }),
                tokio::spawn(async move { stopper.stop("command").await }),
            );

            let state = fx.session.status().state;
            assert!(
                matches!(state, SessionState::Connected | SessionState::Stopped),
                "unexpected terminal state {state}"
            );
            assert_eq!(fx.session.state(), state);
        }
    }

    #[tokio::test]
    async fn concurrent_starts_connect_once() {
        let fx = fixture("tenant-a");
        fx.connector.plan(ConnectPlan::Delay(Duration::from_millis(20)));

        let a = Arc::clone(&fx.session);
        let b = Arc::clone(&fx.session);
        let (first, second) = tokio::join!(a.start(), b.start());

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, StartOutcome::AlreadyActive(_)));
        assert_eq!(outcomes[0], StartOutcome::Connected);
        assert_eq!(outcomes[1], StartOutcome::AlreadyActive(SessionState::Connected));
        assert_eq!(fx.connector.connects(), 1);
    }

    #[tokio::test]
    async fn restart_never_exposes_stopped() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        fx.connector.plan(ConnectPlan::Delay(Duration::from_millis(30)));

        let session = Arc::clone(&fx.session);
        let restart = tokio::spawn(async move { session.restart().await });

        let mut seen = Vec::new();
        while !restart.is_finished() {
            seen.push(fx.session.state());
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        restart.await.unwrap().unwrap();

        assert!(!seen.contains(&SessionState::Stopped));
        assert!(seen.contains(&SessionState::Starting));
        assert_eq!(fx.session.state(), SessionState::Connected);
        assert_eq!(fx.connector.connects(), 2);
        assert_eq!(fx.connector.closes(), 1);
        assert_eq!(fx.session.status().last_stop_reason.as_deref(), Some("restart"));
    }

    #[tokio::test]
    async fn restart_from_stopped_starts() {
        let fx = fixture("tenant-a");
        fx.session.restart().await.unwrap();
        assert_eq!(fx.session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn restart_failure_leaves_failed() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        fx.connector
            .plan(ConnectPlan::Fail(TransportError::Connect("refused".to_string())));

        assert!(fx.session.restart().await.is_err());
        assert_eq!(fx.session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn unexpected_logout_fails_session() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();

        fx.connector.sink().logged_out("device removed");

        wait_until(|| fx.session.state() == SessionState::Failed).await;
        assert_eq!(
            fx.session.status().last_failure.as_deref(),
            Some("logged out: device removed")
        );
        assert_eq!(fx.connector.closes(), 1);
        wait_until(|| {
            fx.sender
                .all()
                .iter()
                .any(|p| p.event == WebhookEventKind::LoggedOut)
        })
        .await;
    }

    #[tokio::test]
    async fn logout_from_replaced_link_is_ignored() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        let old_sink = fx.connector.sink();

        old_sink.logged_out("old device removed");
        fx.session.restart().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = fx.session.status();
        assert_eq!(status.state, SessionState::Connected);
        assert!(status.last_failure.is_none());
        assert_eq!(fx.connector.closes(), 1);
    }

    #[tokio::test]
    async fn logout_after_stop_stays_stopped() {
        let fx = fixture("tenant-a");
        fx.session.start().await.unwrap();
        let sink = fx.connector.sink();
        fx.session.stop("command").await;

        sink.logged_out("session closed");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(fx.session.state(), SessionState::Stopped);
        assert!(
            !fx.sender
                .all()
                .iter()
                .any(|p| p.event == WebhookEventKind::LoggedOut)
        );
    }
}
