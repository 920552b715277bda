//! Session client backed by a browser-automation sidecar.
//!
//! The sidecar owns the automated messaging client (browser, session files,
//! protocol). The bridge talks to it over a local WebSocket: commands go out
//! as JSON requests correlated by `requestId`, replies and lifecycle events
//! come back as JSON frames.

mod client;
mod link;
pub mod protocol;


pub use link::LINK_LOST_REASON;

use protocol::{Command, Request};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;
use wabridge_core::{config::SidecarConfig, error::BridgeError, session::LifecycleEvent};

/// Reply slot for one in-flight request.
type Pending = oneshot::Sender<Result<Value, BridgeError>>;

/// Outbound half of one established link.
#[derive(Clone)]
pub(crate) struct Link {
    /// Distinguishes this link from earlier and later ones.
    pub(crate) id: u64,
    pub(crate) tx: mpsc::Sender<Request>,
}

/// State shared between the client handle and its link tasks.
pub(crate) struct Shared {
    pub(crate) config: SidecarConfig,
    pub(crate) session_id: String,
    /// The live link. `None` while disconnected.
    pub(crate) outbound: RwLock<Option<Link>>,
    /// Last link id handed out.
    pub(crate) link_ids: AtomicU64,
    /// Mirrors `outbound.is_some()` for waiters.
    pub(crate) linked: watch::Sender<bool>,
    /// In-flight requests waiting for a `result` frame.
    pub(crate) pending: Mutex<HashMap<String, Pending>>,
    /// Current lifecycle subscriber, replaced by `subscribe()`.
    pub(crate) events: Mutex<Option<mpsc::Sender<LifecycleEvent>>>,
}

impl Shared {
    /// Publish a new link and return its id.
    pub(crate) async fn attach(&self, tx: mpsc::Sender<Request>) -> u64 {
        let id = self.link_ids.fetch_add(1, Ordering::Relaxed) + 1;
        *self.outbound.write().await = Some(Link { id, tx });
        self.linked.send_replace(true);
        id
    }

    /// Withdraw the live link. Callers fail the pending requests afterwards.
    pub(crate) async fn detach(&self) {
        *self.outbound.write().await = None;
        self.linked.send_replace(false);
    }

    /// Park a reply slot for `request_id`, sent over link `link_id`.
    ///
    /// Fails if that link is no longer the live one: its teardown may already
    /// have drained `pending`, and nothing would ever answer the slot.
    pub(crate) async fn register(
        &self,
        link_id: u64,
        request_id: &str,
    ) -> Result<oneshot::Receiver<Result<Value, BridgeError>>, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.to_string(), tx);

        let current = self.outbound.read().await.as_ref().map(|link| link.id);
        if current != Some(link_id) {
            self.pending.lock().await.remove(request_id);
            return Err(BridgeError::Client(
                "sidecar link closed before the request was sent".into(),
            ));
        }
        Ok(rx)
    }
}

/// Session client speaking to the automation sidecar.
pub struct SidecarClient {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl SidecarClient {
    /// Create a client for one session. Nothing connects until [`start`](Self::start).
    pub fn new(config: SidecarConfig, session_id: &str) -> Self {
        let (linked, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                session_id: session_id.to_string(),
                outbound: RwLock::new(None),
                link_ids: AtomicU64::new(0),
                linked,
                pending: Mutex::new(HashMap::new()),
                events: Mutex::new(None),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Spawn the link supervisor. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut supervisor = self.supervisor.lock().await;
        if supervisor.is_some() {
            return;
        }
        *supervisor = Some(tokio::spawn(link::supervise(self.shared.clone())));
    }

    /// Stop the supervisor and drop the live link.
    pub async fn stop(&self) {
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }
        self.shared.detach().await;
        link::fail_pending(&self.shared, "sidecar client stopped").await;
    }

    /// Whether a sidecar link is currently up.
    pub fn is_linked(&self) -> bool {
        *self.shared.linked.borrow()
    }

    /// Resolve once a link is up. Pair with a timeout if the caller cannot wait forever.
    pub async fn wait_linked(&self) {
        let mut linked = self.shared.linked.subscribe();
        // The sender lives in `shared`, so the channel cannot close under us.
        let _ = linked.wait_for(|up| *up).await;
    }

    /// Send a command and wait for its `result` frame.
    pub(crate) async fn request(&self, command: Command) -> Result<Value, BridgeError> {
        let label = command.label();
        let link = self
            .shared
            .outbound
            .read()
            .await
            .clone()
            .ok_or_else(|| BridgeError::Client("sidecar not connected".into()))?;

        let request_id = Uuid::new_v4().to_string();
        let rx = self.shared.register(link.id, &request_id).await?;

        let request = Request {
            request_id: request_id.clone(),
            session: self.shared.session_id.clone(),
            command,
        };

        if link.tx.send(request).await.is_err() {
            self.shared.pending.lock().await.remove(&request_id);
            return Err(BridgeError::Client(format!(
                "sidecar link closed before {label} was sent"
            )));
        }

        rx.await.map_err(|_| {
            BridgeError::Client(format!("sidecar dropped {label} request {request_id}"))
        })?
    }
}
