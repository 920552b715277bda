//! Link supervision: connect, pump frames, reconnect.

use super::protocol::{Frame, Request};
use super::Shared;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};
use wabridge_core::{error::BridgeError, session::LifecycleEvent};

/// Disconnect reason reported when the sidecar link itself goes away.
pub const LINK_LOST_REASON: &str = "SIDECAR_LINK_LOST";

/// Keep a link to the sidecar alive for as long as the task runs.
///
/// Every lost link fails the in-flight requests and is reported to the
/// lifecycle subscriber as a disconnect.
pub(super) async fn supervise(shared: Arc<Shared>) {
    let url = shared.config.url.clone();
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                info!("connected to sidecar at {url}");
                run_link(&shared, ws).await;
                warn!("sidecar link at {url} lost");
                emit(
                    &shared,
                    LifecycleEvent::Disconnected {
                        reason: LINK_LOST_REASON.to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                warn!("failed to connect to sidecar at {url}: {e}");
            }
        }
        tokio::time::sleep(shared.config.retry_delay()).await;
    }
}

/// Pump one established link until either side closes it.
async fn run_link<S>(shared: &Arc<Shared>, ws: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::channel::<Request>(32);
    let link_id = shared.attach(tx).await;
    debug!("sidecar link {link_id} attached");

    let writer_shared = shared.clone();
    let writer = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let json = match serde_json::to_string(&request) {
                Ok(json) => json,
                Err(e) => {
                    error!("failed to encode sidecar request: {e}");
                    fail_one(&writer_shared, &request.request_id, BridgeError::from(e)).await;
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json.into())).await {
                error!("failed to write to sidecar: {e}");
                break;
            }
            debug!(
                "sent {} request {} to sidecar",
                request.command.label(),
                request.request_id
            );
        }
    });

    while let Some(incoming) = read.next().await {
        match incoming {
            Ok(Message::Text(text)) => dispatch(shared, &text).await,
            Ok(Message::Close(_)) => {
                info!("sidecar closed the link");
                break;
            }
            Ok(_) => {} // ping/pong/binary
            Err(e) => {
                error!("sidecar read error: {e}");
                break;
            }
        }
    }

    // Detach before draining: requests registered after this point see a
    // stale link id and fail on their own.
    shared.detach().await;
    writer.abort();
    fail_pending(shared, "sidecar connection closed").await;
}

/// Route one text frame to its waiting request or to the lifecycle subscriber.
async fn dispatch(shared: &Shared, text: &str) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("ignoring malformed sidecar frame: {e}");
            return;
        }
    };

    match frame {
        Frame::Result {
            request_id,
            success,
            value,
            error,
        } => {
            let Some(slot) = shared.pending.lock().await.remove(&request_id) else {
                debug!("result for unknown request {request_id}");
                return;
            };
            let outcome = if success {
                Ok(value)
            } else {
                Err(BridgeError::Client(
                    error.unwrap_or_else(|| "sidecar reported failure".to_string()),
                ))
            };
            let _ = slot.send(outcome);
        }
        other => match other.into_event() {
            Some(event) => emit(shared, event).await,
            None => debug!("ignoring unknown sidecar frame"),
        },
    }
}

/// Forward a lifecycle event to the current subscriber, if any.
pub(super) async fn emit(shared: &Shared, event: LifecycleEvent) {
    let subscriber = shared.events.lock().await.clone();
    match subscriber {
        Some(tx) => {
            if tx.send(event).await.is_err() {
                debug!("lifecycle subscriber dropped");
            }
        }
        None => debug!("no lifecycle subscriber for {} event", event.name()),
    }
}

/// Answer one in-flight request with an error.
pub(super) async fn fail_one(shared: &Shared, request_id: &str, err: BridgeError) {
    if let Some(slot) = shared.pending.lock().await.remove(request_id) {
        let _ = slot.send(Err(err));
    }
}

/// Fail every in-flight request with the same reason.
pub(super) async fn fail_pending(shared: &Shared, reason: &str) {
    let drained: Vec<_> = shared.pending.lock().await.drain().collect();
    if !drained.is_empty() {
        warn!("failing {} in-flight sidecar requests: {reason}", drained.len());
    }
    for (_, slot) in drained {
        let _ = slot.send(Err(BridgeError::Client(reason.to_string())));
    }
}
