//! Test doubles shared by the lifecycle and API tests.

use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use wabridge_core::{
    error::BridgeError,
    session::{ConnectionState, LifecycleEvent},
    traits::SessionClient,
};

/// Id returned by every successful mock send.
pub const MOCK_MESSAGE_ID: &str = "ABCD";

/// A session client that records calls and fails on demand.
#[derive(Default)]
pub struct MockClient {
    pub initialize_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub state_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    /// What `get_state` reports.
    pub live_state: Mutex<Option<ConnectionState>>,
    pub fail_initialize: AtomicBool,
    pub fail_logout: AtomicBool,
    pub fail_destroy: AtomicBool,
    pub fail_state: AtomicBool,
    pub fail_send: AtomicBool,
    /// `(chat_id, content)` of every send.
    pub sent: Mutex<Vec<(String, String)>>,
    /// While set, `wait_available` blocks.
    offline: AtomicBool,
    back_online: Notify,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reporting(state: Option<ConnectionState>) -> Arc<Self> {
        let client = Self::default();
        *client.live_state.lock().unwrap() = state;
        Arc::new(client)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    /// Simulate the client's transport going away or coming back.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
        if online {
            self.back_online.notify_waiters();
        }
    }
}

#[async_trait]
impl SessionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<LifecycleEvent>, BridgeError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn wait_available(&self) {
        loop {
            // Register before checking so a concurrent `set_online(true)` is not missed.
            let notified = self.back_online.notified();
            if !self.offline.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    async fn initialize(&self) -> Result<(), BridgeError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("sidecar not connected".into()));
        }
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("browser failed to launch".into()));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("logout failed".into()));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BridgeError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_destroy.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("destroy failed".into()));
        }
        Ok(())
    }

    async fn get_state(&self) -> Result<Option<ConnectionState>, BridgeError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_state.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("page crashed".into()));
        }
        Ok(*self.live_state.lock().unwrap())
    }

    async fn send_message(&self, chat_id: &str, content: &str) -> Result<String, BridgeError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BridgeError::Client("Evaluation failed: chat not found".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), content.to_string()));
        Ok(MOCK_MESSAGE_ID.to_string())
    }
}

/// One webhook delivery as seen by the receiver: `(x-api-key, body)`.
pub type Delivery = (Option<String>, Value);

/// Start a local webhook endpoint that records deliveries and answers `status`.
pub async fn webhook_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel::<Delivery>();

    async fn hook(
        State((tx, status)): State<(mpsc::UnboundedSender<Delivery>, StatusCode)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let _ = tx.send((key, body));
        status
    }

    let app = Router::new()
        .route("/hook", post(hook))
        .with_state((tx, status));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/hook"), rx)
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
