//! Finite State Machine for interactive sessions

use serde::{Deserialize, Serialize};

use crate::errors::AdmError;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, nothing opened yet
    Idle,

    /// Transport being established
    Connecting,

    /// Streams are relayed
    Attached,

    /// Transport released; terminal
    Closed,
}

/// Why an attached session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The remote process exited and reported its status
    RemoteExit,

    /// The remote side closed the stream without a status
    RemoteEof,

    /// The local side detached
    Detached,

    /// A local termination signal ended the session
    Interrupted,

    /// Transport error or remote rejection
    Failed,
}

/// Session event
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Start opening the transport
    Connect,

    /// Transport is up
    Connected,

    /// Transport could not be opened
    ConnectFailed(String),

    /// Orderly end of an attached session
    Close(CloseReason),

    /// Attached session aborted
    Fail(String),
}

/// Session FSM
#[derive(Debug, Clone)]
pub struct SessionFsm {
    state: SessionState,
    close_reason: Option<CloseReason>,
    error: Option<String>,
}

impl SessionFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            close_reason: None,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the session closed, once it has
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SessionEvent) -> Result<(), AdmError> {
        let new_state = match (self.state, &event) {
            (SessionState::Idle, SessionEvent::Connect) => SessionState::Connecting,

            (SessionState::Connecting, SessionEvent::Connected) => SessionState::Attached,
            (SessionState::Connecting, SessionEvent::ConnectFailed(err)) => {
                self.error = Some(err.clone());
                self.close_reason = Some(CloseReason::Failed);
                SessionState::Closed
            }

            (SessionState::Attached, SessionEvent::Close(reason)) => {
                self.close_reason = Some(*reason);
                SessionState::Closed
            }
            (SessionState::Attached, SessionEvent::Fail(err)) => {
                self.error = Some(err.clone());
                self.close_reason = Some(CloseReason::Failed);
                SessionState::Closed
            }

            // Invalid transitions
            (state, event) => {
                return Err(AdmError::SessionError(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }
}

impl Default for SessionFsm {
    fn default() -> Self {
        Self::new()
    }
}
