//! # Readiness gate.
//!
//! The router is usable only once both connections have reported ready. The
//! gate is a small state machine fed by each connection's ready signal:
//!
//! ```text
//!                 ready(A)                      ready(B), B != A
//!  WaitingBoth ─────────────► WaitingOne{A} ───────────────────────► Ready
//!                                  │  ▲                              (terminal)
//!                                  └──┘ ready(A) again: ignored
//! ```
//!
//! ## Rules
//! - Only the first ready signal of each connection counts.
//! - `Ready` is terminal; it is reached exactly once per router.
//! - Until `Ready`, inbound notifications are dropped by the listener.
//! - Connection errors do not touch the gate.

use tokio::sync::watch;

use crate::transport::Role;

/// Readiness of the two connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Neither connection has reported ready.
    WaitingBoth,
    /// One connection (`ready`) has reported; the other has not.
    WaitingOne { ready: Role },
    /// Both connections are ready; dispatch is armed.
    Ready,
}

/// Outcome of feeding one ready signal into the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// First signal from this connection; still waiting for the other.
    Counted,
    /// Second connection reported; the gate just opened.
    Opened,
    /// Repeated signal or gate already open; nothing changed.
    Ignored,
}

impl GateState {
    /// Pure transition function.
    pub(crate) fn advance(self, role: Role) -> (GateState, Transition) {
        match self {
            GateState::WaitingBoth => (GateState::WaitingOne { ready: role }, Transition::Counted),
            GateState::WaitingOne { ready } if ready == role => (self, Transition::Ignored),
            GateState::WaitingOne { .. } => (GateState::Ready, Transition::Opened),
            GateState::Ready => (self, Transition::Ignored),
        }
    }
}

/// Shared, observable readiness gate.
pub(crate) struct ReadinessGate {
    state: watch::Sender<GateState>,
}

impl ReadinessGate {
    pub(crate) fn new() -> Self {
        let (state, _rx) = watch::channel(GateState::WaitingBoth);
        Self { state }
    }

    /// Feeds one connection's ready signal.
    pub(crate) fn on_ready(&self, role: Role) -> Transition {
        let mut outcome = Transition::Ignored;
        self.state.send_if_modified(|state| {
            let (next, transition) = state.advance(role);
            outcome = transition;
            *state = next;
            transition != Transition::Ignored
        });
        outcome
    }

    pub(crate) fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == GateState::Ready
    }

    pub(crate) fn watch(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }
}
