//! Webhook dispatcher with one ordered delivery lane per (session, endpoint).
//!
//! `dispatch` never blocks the caller: each payload is pushed onto a bounded
//! `mpsc` lane and a background worker delivers it with retry. A lane
//! delivers strictly in order, so a payload waits while the one ahead of it
//! is being retried. Lanes for different endpoints run independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tenantgate_types::config::WebhookConfig;
use tenantgate_types::session::{Token, TokenFingerprint};
use tenantgate_types::webhook::{DeliveryFailure, WebhookEvent, WebhookPayload, WebhookTarget};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use super::sender::BoxWebhookSender;

/// Buffer size for the delivery-failure broadcast channel.
const FAILURE_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LaneKey {
    token: Token,
    url: String,
}

struct Lane {
    tx: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

struct Job {
    target: WebhookTarget,
    payload: WebhookPayload,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    /// Payloads given up on (retries exhausted or permanent rejection).
    pub failed: u64,
    /// Payloads refused because a lane was full or no runtime was available.
    pub dropped: u64,
    pub lanes: usize,
}

/// Everything a lane worker needs, cloned out of the dispatcher.
struct LaneWorker {
    sender: Arc<BoxWebhookSender>,
    policy: RetryPolicy,
    counters: Arc<Counters>,
    failures: broadcast::Sender<DeliveryFailure>,
    token: TokenFingerprint,
    url: String,
}

impl LaneWorker {
    async fn run(self, mut rx: mpsc::Receiver<Job>) {
        while let Some(job) = rx.recv().await {
            self.deliver(job).await;
        }
        debug!(token = %self.token, url = %self.url, "webhook lane closed");
    }

    async fn deliver(&self, job: Job) {
        let mut attempt: u32 = 1;
        loop {
            match self.sender.send(&job.target, &job.payload).await {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        token = %self.token,
                        url = %self.url,
                        event = %job.payload.event,
                        attempt,
                        "webhook delivered"
                    );
                    return;
                }
                Err(err) if self.policy.should_retry(attempt, &err) => {
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        token = %self.token,
                        url = %self.url,
                        event = %job.payload.event,
                        attempt,
                        ?delay,
                        error = %err,
                        "webhook delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        token = %self.token,
                        url = %self.url,
                        event = %job.payload.event,
                        attempts = attempt,
                        permanent = err.is_permanent(),
                        error = %err,
                        "webhook delivery abandoned"
                    );
                    let _ = self.failures.send(DeliveryFailure {
                        token: self.token.clone(),
                        url: self.url.clone(),
                        event: job.payload.event,
                        attempts: attempt,
                        error: err.to_string(),
                        failed_at: Utc::now(),
                    });
                    return;
                }
            }
        }
    }
}

/// Fan-out of session events to webhook endpoints.
pub struct WebhookDispatcher {
    sender: Arc<BoxWebhookSender>,
    policy: RetryPolicy,
    queue_capacity: usize,
    lanes: DashMap<LaneKey, Lane>,
    counters: Arc<Counters>,
    failures: broadcast::Sender<DeliveryFailure>,
    /// Runtime lane workers are spawned on, independent of the calling thread.
    runtime: Option<Handle>,
}

impl WebhookDispatcher {
    /// Build a dispatcher bound to the runtime it is created in, if any.
    pub fn new(sender: BoxWebhookSender, policy: RetryPolicy, queue_capacity: usize) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_BUFFER);
        Self {
            sender: Arc::new(sender),
            policy,
            queue_capacity: queue_capacity.max(1),
            lanes: DashMap::new(),
            counters: Arc::new(Counters::default()),
            failures,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Bind lane workers to `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// The bound runtime, or the caller's current one.
    pub fn runtime(&self) -> Option<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    pub fn from_config(sender: BoxWebhookSender, config: &WebhookConfig) -> Self {
        Self::new(sender, RetryPolicy::from_config(config), config.queue_capacity)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Enqueue `event` for every target. Returns how many payloads were queued.
    ///
    /// Never waits on network I/O or on a full lane: payloads that do not fit
    /// are dropped and counted.
    pub fn dispatch(&self, token: &Token, event: &WebhookEvent, targets: &[WebhookTarget]) -> usize {
        let Some(runtime) = self.runtime() else {
            self.counters
                .dropped
                .fetch_add(targets.len() as u64, Ordering::Relaxed);
            warn!(token = %token.fingerprint(), "no async runtime, webhook event dropped");
            return 0;
        };

        let mut queued = 0;
        for target in targets {
            let key = LaneKey {
                token: token.clone(),
                url: target.url.clone(),
            };
            let tx = self
                .lanes
                .entry(key.clone())
                .or_insert_with(|| self.spawn_lane(&runtime, token, &target.url))
                .tx
                .clone();

            let job = Job {
                target: target.clone(),
                payload: event.to_payload(token, target),
            };
            match tx.try_send(job) {
                Ok(()) => {
                    self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                    queued += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        token = %token.fingerprint(),
                        url = %target.url,
                        event = %event.kind,
                        "webhook lane full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    self.lanes.remove_if(&key, |_, lane| lane.tx.is_closed());
                    warn!(
                        token = %token.fingerprint(),
                        url = %target.url,
                        "webhook lane worker gone, event dropped"
                    );
                }
            }
        }
        queued
    }

    fn spawn_lane(&self, runtime: &Handle, token: &Token, url: &str) -> Lane {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let worker = LaneWorker {
            sender: Arc::clone(&self.sender),
            policy: self.policy,
            counters: Arc::clone(&self.counters),
            failures: self.failures.clone(),
            token: token.fingerprint(),
            url: url.to_string(),
        };
        debug!(token = %worker.token, url, "opening webhook lane");
        let handle = runtime.spawn(worker.run(rx));
        Lane { tx, handle }
    }

    /// Close the lane for one endpoint. Already queued payloads are still delivered.
    pub fn retire(&self, token: &Token, url: &str) -> bool {
        let key = LaneKey {
            token: token.clone(),
            url: url.to_string(),
        };
        self.lanes.remove(&key).is_some()
    }

    /// Close every lane belonging to `token`. Returns how many were closed.
    pub fn retire_session(&self, token: &Token) -> usize {
        let keys: Vec<LaneKey> = self
            .lanes
            .iter()
            .filter(|entry| &entry.key().token == token)
            .map(|entry| entry.key().clone())
            .collect();
        keys.iter()
            .filter(|key| self.lanes.remove(*key).is_some())
            .count()
    }

    /// Subscribe to records of abandoned deliveries.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.failures.subscribe()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            lanes: self.lanes.len(),
        }
    }

    /// Close all lanes and wait for their queued payloads to finish.
    pub async fn shutdown(&self) {
        let keys: Vec<LaneKey> = self.lanes.iter().map(|entry| entry.key().clone()).collect();
        let handles: Vec<JoinHandle<()>> = keys
            .iter()
            .filter_map(|key| self.lanes.remove(key))
            .map(|(_, lane)| lane.handle)
            .collect();

        let count = handles.len();
        for result in futures_util::future::join_all(handles).await {
            if let Err(err) = result {
                error!(error = %err, "webhook lane worker panicked");
            }
        }
        info!(lanes = count, "webhook dispatcher drained");
    }
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("policy", &self.policy)
            .field("lanes", &self.lanes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tenantgate_types::error::DeliveryError;
    use tenantgate_types::message::Message;
    use tenantgate_types::webhook::WebhookEventKind;

    use crate::testing::{RecordingSender, wait_until};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn event(id: &str) -> WebhookEvent {
        WebhookEvent::message(Message::inbound(id, "5511@s.whatsapp.net", "hi"))
    }

    #[tokio::test]
    async fn delivers_in_order_per_endpoint() {
        let sender = RecordingSender::new();
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(3), 16);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://a.example"), WebhookTarget::new("https://b.example")];

        for id in ["m1", "m2", "m3"] {
            assert_eq!(dispatcher.dispatch(&token, &event(id), &targets), 2);
        }
        wait_until(|| dispatcher.stats().delivered == 6).await;

        for url in ["https://a.example", "https://b.example"] {
            let ids: Vec<String> = sender
                .deliveries_to(url)
                .into_iter()
                .map(|p| p.message.unwrap().id)
                .collect();
            assert_eq!(ids, vec!["m1", "m2", "m3"]);
        }
        assert_eq!(dispatcher.stats().lanes, 2);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_before_next_payload() {
        let sender = RecordingSender::new();
        sender.script(
            "https://a.example",
            vec![
                Err(DeliveryError::Unavailable("reset".to_string())),
                Err(DeliveryError::Rejected { status: 503 }),
            ],
        );
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(5), 16);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://a.example")];

        dispatcher.dispatch(&token, &event("m1"), &targets);
        dispatcher.dispatch(&token, &event("m2"), &targets);
        wait_until(|| dispatcher.stats().delivered == 2).await;

        let stats = dispatcher.stats();
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.failed, 0);
        let ids: Vec<String> = sender
            .deliveries_to("https://a.example")
            .into_iter()
            .map(|p| p.message.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["m1", "m1", "m1", "m2"]);
    }

    #[tokio::test]
    async fn permanent_rejection_is_recorded_not_retried() {
        let sender = RecordingSender::new();
        sender.script("https://a.example", vec![Err(DeliveryError::Rejected { status: 404 })]);
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(5), 16);
        let mut failures = dispatcher.subscribe_failures();
        let token = Token::new("tenant-a");

        dispatcher.dispatch(&token, &event("m1"), &[WebhookTarget::new("https://a.example")]);

        let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.url, "https://a.example");
        assert_eq!(failure.event, WebhookEventKind::Message);
        assert_eq!(failure.token, token.fingerprint());
        assert_eq!(dispatcher.stats().failed, 1);
        assert_eq!(dispatcher.stats().retried, 0);
    }

    #[tokio::test]
    async fn exhausted_retries_are_abandoned() {
        let sender = RecordingSender::new();
        sender.script(
            "https://a.example",
            vec![
                Err(DeliveryError::Unavailable("down".to_string())),
                Err(DeliveryError::Unavailable("down".to_string())),
                Err(DeliveryError::Unavailable("down".to_string())),
            ],
        );
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(3), 16);
        let token = Token::new("tenant-a");

        dispatcher.dispatch(&token, &event("m1"), &[WebhookTarget::new("https://a.example")]);
        wait_until(|| dispatcher.stats().failed == 1).await;

        assert_eq!(dispatcher.stats().retried, 2);
        assert_eq!(sender.deliveries_to("https://a.example").len(), 3);
    }

    #[tokio::test]
    async fn failing_endpoint_does_not_delay_others() {
        let sender = RecordingSender::new();
        sender.hang("https://slow.example");
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(3), 16);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://slow.example"), WebhookTarget::new("https://fast.example")];

        dispatcher.dispatch(&token, &event("m1"), &targets);
        wait_until(|| sender.deliveries_to("https://fast.example").len() == 1).await;
        assert_eq!(dispatcher.stats().delivered, 1);
    }

    #[tokio::test]
    async fn full_lane_drops_without_blocking() {
        let sender = RecordingSender::new();
        sender.hang("https://slow.example");
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(1), 1);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://slow.example")];

        // first payload is taken by the worker, second fills the queue
        dispatcher.dispatch(&token, &event("m1"), &targets);
        wait_until(|| sender.deliveries_to("https://slow.example").len() == 1).await;
        assert_eq!(dispatcher.dispatch(&token, &event("m2"), &targets), 1);
        assert_eq!(dispatcher.dispatch(&token, &event("m3"), &targets), 0);
        assert_eq!(dispatcher.stats().dropped, 1);
    }

    #[tokio::test]
    async fn retire_keeps_queued_payloads() {
        let sender = RecordingSender::new();
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(1), 16);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://a.example")];

        dispatcher.dispatch(&token, &event("m1"), &targets);
        dispatcher.dispatch(&token, &event("m2"), &targets);
        assert!(dispatcher.retire(&token, "https://a.example"));
        assert_eq!(dispatcher.stats().lanes, 0);

        wait_until(|| dispatcher.stats().delivered == 2).await;
    }

    #[tokio::test]
    async fn retire_session_only_touches_that_token() {
        let sender = RecordingSender::new();
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(1), 16);
        let targets = vec![WebhookTarget::new("https://a.example"), WebhookTarget::new("https://b.example")];

        dispatcher.dispatch(&Token::new("tenant-a"), &event("m1"), &targets);
        dispatcher.dispatch(&Token::new("tenant-b"), &event("m1"), &targets);
        assert_eq!(dispatcher.retire_session(&Token::new("tenant-a")), 2);
        assert_eq!(dispatcher.stats().lanes, 2);
    }

    #[tokio::test]
    async fn shutdown_drains_lanes() {
        let sender = RecordingSender::new();
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(1), 16);
        let token = Token::new("tenant-a");
        let targets = vec![WebhookTarget::new("https://a.example")];
        for id in ["m1", "m2", "m3"] {
            dispatcher.dispatch(&token, &event(id), &targets);
        }

        dispatcher.shutdown().await;

        assert_eq!(dispatcher.stats().delivered, 3);
        assert_eq!(dispatcher.stats().lanes, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_from_plain_thread_uses_bound_runtime() {
        let sender = RecordingSender::new();
        let dispatcher = Arc::new(WebhookDispatcher::new(
            BoxWebhookSender::new(sender.clone()),
            fast_policy(1),
            16,
        ));

        let remote = Arc::clone(&dispatcher);
        let queued = std::thread::spawn(move || {
            remote.dispatch(
                &Token::new("tenant-a"),
                &event("m1"),
                &[WebhookTarget::new("https://a.example")],
            )
        })
        .join()
        .unwrap();

        assert_eq!(queued, 1);
        wait_until(|| dispatcher.stats().delivered == 1).await;
        assert_eq!(dispatcher.stats().dropped, 0);
    }

    #[test]
    fn explicit_runtime_serves_dispatcher_built_outside_one() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let sender = RecordingSender::new();
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(sender.clone()), fast_policy(1), 16)
            .with_runtime(runtime.handle().clone());

        let queued = dispatcher.dispatch(
            &Token::new("tenant-a"),
            &event("m1"),
            &[WebhookTarget::new("https://a.example")],
        );

        assert_eq!(queued, 1);
        runtime.block_on(wait_until(|| dispatcher.stats().delivered == 1));
    }

    #[test]
    fn dispatch_without_runtime_counts_dropped() {
        let dispatcher = WebhookDispatcher::new(BoxWebhookSender::new(RecordingSender::new()), fast_policy(1), 16);
        let queued = dispatcher.dispatch(
            &Token::new("tenant-a"),
            &event("m1"),
            &[WebhookTarget::new("https://a.example")],
        );
        assert_eq!(queued, 0);
        assert_eq!(dispatcher.stats().dropped, 1);
    }
}
