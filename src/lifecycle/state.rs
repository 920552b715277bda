//! Session lifecycle state and its single transition function.

use std::sync::{Mutex, PoisonError};
use wabridge_core::session::ConnectionState;

/// Everything the bridge tracks about the session, as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Believed connection state.
    pub connection: ConnectionState,
    /// An initialize attempt is in flight.
    pub initializing: bool,
    /// A logout or restart is in flight.
    pub restarting: bool,
}

/// Inputs to the state machine. Lifecycle events and HTTP requests both
/// arrive here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Claim the initialize slot. Rejected while another attempt is in flight.
    BeginInitialize,
    /// The client refused to initialize.
    InitializeFailed,
    QrIssued,
    Authenticated,
    Ready,
    AuthFailure,
    Disconnected,
    /// A live state query returned a usable value.
    Refreshed(ConnectionState),
    /// Claim the teardown slot. Rejected while a logout/restart is in flight.
    BeginTeardown,
    /// The client finished logging out or destroying the session.
    TeardownComplete,
    /// Teardown failed; release the slot.
    TeardownAborted,
    /// The deferred re-initialization after a teardown fired.
    TeardownSettled,
}

/// Process-wide session state, owned by whoever constructs it.
///
/// All mutation goes through [`SessionState::apply`], which holds the lock
/// for the duration of one transition and never across an await.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Snapshot>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current values.
    pub fn snapshot(&self) -> Snapshot {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connection(&self) -> ConnectionState {
        self.snapshot().connection
    }

    /// Apply one transition. Returns `false` only when a guarded transition
    /// (`BeginInitialize`, `BeginTeardown`) was rejected.
    pub fn apply(&self, transition: Transition) -> bool {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match transition {
            Transition::BeginInitialize => {
                if s.initializing {
                    return false;
                }
                s.initializing = true;
                s.connection = ConnectionState::Initializing;
            }
            Transition::InitializeFailed => {
                s.initializing = false;
                s.connection = ConnectionState::Disconnected;
            }
            Transition::Authenticated => {
                s.initializing = false;
            }
            Transition::QrIssued => {
                s.initializing = false;
                s.connection = ConnectionState::Initializing;
            }
            Transition::Ready => {
                s.initializing = false;
                s.connection = ConnectionState::Connected;
            }
            Transition::AuthFailure | Transition::Disconnected => {
                s.initializing = false;
                s.connection = ConnectionState::Disconnected;
            }
            Transition::Refreshed(state) => {
                s.connection = state;
            }
            Transition::BeginTeardown => {
                if s.restarting {
                    return false;
                }
                s.restarting = true;
            }
            Transition::TeardownComplete => {
                // The session is gone, so is any initialize attempt against it.
                s.initializing = false;
                s.connection = ConnectionState::Disconnected;
            }
            Transition::TeardownAborted | Transition::TeardownSettled => {
                s.restarting = false;
            }
        }
        true
    }
}
