//! Test doubles shared by the core unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tenantgate_types::error::{DeliveryError, TransportError};
use tenantgate_types::session::Token;
use tenantgate_types::toggle::ToggleValues;
use tenantgate_types::webhook::{WebhookPayload, WebhookTarget};

use crate::session::{Session, SessionOptions};
use crate::sink::EventSink;
use crate::transport::{BoxTransportConnector, TransportConnector, TransportLink};
use crate::webhook::{BoxWebhookSender, RetryPolicy, WebhookDispatcher, WebhookSender};

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// RecordingSender
// ---------------------------------------------------------------------------

/// Webhook sender that records every attempt and replays scripted results.
#[derive(Clone, Default)]
pub struct RecordingSender {
    attempts: Arc<Mutex<Vec<(String, WebhookPayload)>>>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<(), DeliveryError>>>>>,
    hanging: Arc<Mutex<HashSet<String>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned, in order, for the next attempts to `url`. Once the
    /// script runs out every attempt succeeds.
    pub fn script(&self, url: &str, results: Vec<Result<(), DeliveryError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), results.into());
    }

    /// Attempts to `url` never complete.
    pub fn hang(&self, url: &str) {
        self.hanging.lock().unwrap().insert(url.to_string());
    }

    /// Every attempt made to `url`, including failed ones.
    pub fn deliveries_to(&self, url: &str) -> Vec<WebhookPayload> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<WebhookPayload> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl WebhookSender for RecordingSender {
    async fn send(
        &self,
        target: &WebhookTarget,
        payload: &WebhookPayload,
    ) -> Result<(), DeliveryError> {
        self.attempts
            .lock()
            .unwrap()
            .push((target.url.clone(), payload.clone()));
        let hang = self.hanging.lock().unwrap().contains(&target.url);
        if hang {
            std::future::pending::<()>().await;
        }
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&target.url)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}

// ---------------------------------------------------------------------------
// ScriptedConnector
// ---------------------------------------------------------------------------

/// What the next `connect` call does.
#[derive(Debug, Clone)]
pub enum ConnectPlan {
    Succeed,
    Fail(TransportError),
    /// Succeed after a delay.
    Delay(Duration),
    /// Never resolve.
    Hang,
}

#[derive(Default)]
struct ConnectorState {
    plans: Mutex<VecDeque<ConnectPlan>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
}

/// Transport connector driven by a queue of plans. Unplanned calls succeed.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<ConnectorState>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, plan: ConnectPlan) -> &Self {
        self.state.plans.lock().unwrap().push_back(plan);
        self
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// The sink handed over by the most recent `connect` call.
    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.state
            .sink
            .lock()
            .unwrap()
            .clone()
            .expect("connect has not been called")
    }
}

struct ScriptedLink {
    closes: Arc<AtomicUsize>,
}

impl TransportLink for ScriptedLink {
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl TransportConnector for ScriptedConnector {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(
        &self,
        _token: &Token,
        sink: Arc<dyn EventSink>,
    ) -> Result<Box<dyn TransportLink>, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.sink.lock().unwrap() = Some(sink);
        let plan = self
            .state
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectPlan::Succeed);

        match plan {
            ConnectPlan::Succeed => {}
            ConnectPlan::Fail(err) => return Err(err),
            ConnectPlan::Delay(delay) => tokio::time::sleep(delay).await,
            ConnectPlan::Hang => std::future::pending::<()>().await,
        }
        Ok(Box::new(ScriptedLink {
            closes: Arc::clone(&self.state.closes),
        }))
    }
}

// ---------------------------------------------------------------------------
// Session fixtures
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub session: Arc<Session>,
    pub connector: ScriptedConnector,
    pub sender: RecordingSender,
    pub dispatcher: Arc<WebhookDispatcher>,
}

pub fn fixture(token: &str) -> Fixture {
    fixture_with(token, ToggleValues::default(), Duration::from_secs(5))
}

pub fn fixture_with(token: &str, toggles: ToggleValues, start_timeout: Duration) -> Fixture {
    let connector = ScriptedConnector::new();
    let sender = RecordingSender::new();
    let dispatcher = Arc::new(WebhookDispatcher::new(
        BoxWebhookSender::new(sender.clone()),
        RetryPolicy::new(1, Duration::ZERO, Duration::ZERO),
        64,
    ));
    let session = Session::new(
        Token::new(token),
        SessionOptions {
            cache_capacity: 16,
            start_timeout,
            toggles,
        },
        Arc::new(BoxTransportConnector::new(connector.clone())),
        Arc::clone(&dispatcher),
    );
    session.add_webhook(WebhookTarget::new("https://hooks.example.com/in"));
    Fixture {
        session,
        connector,
        sender,
        dispatcher,
    }
}
