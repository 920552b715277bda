use super::SessionManager;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use wabridge_core::session::LifecycleEvent;

/// Feed client events into the manager until the client drops its sender.
pub fn spawn_event_pump(
    manager: SessionManager,
    mut rx: mpsc::Receiver<LifecycleEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("lifecycle event: {}", event.name());
            manager.handle_event(event);
        }
        info!("session event stream closed");
    })
}
