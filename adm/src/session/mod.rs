//! Remote sessions to service containers.
//!
//! A host is reached either through the local ssh client or through the
//! HTTP agent it runs. Both transports implement the same capabilities:
//! [`RemoteSession`] for one interactive attach, [`RemoteExecutor`] for
//! non-interactive commands. [`factory::TransportFactory`] picks the
//! transport from the host's protocol; nothing else looks at it.

pub mod factory;
pub mod fsm;
pub mod http;
pub mod shell;
pub mod terminal;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AdmError;

pub use factory::{SessionFactory, TransportFactory};
pub use fsm::{CloseReason, SessionEvent, SessionFsm, SessionState};

/// How an attached session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionExit {
    /// Exit status of the remote process, when the transport reports one
    pub code: Option<i32>,
    pub reason: CloseReason,
}

impl SessionExit {
    /// Process exit status the CLI should finish with
    pub fn exit_status(&self) -> i32 {
        match (self.reason, self.code) {
            (CloseReason::Interrupted, _) => 130,
            (_, Some(code)) => code,
            (_, None) => 0,
        }
    }
}

/// Result of a non-interactive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One interactive session to a container. Single use: once it has left
/// `Idle`, further `attach` calls fail with `SessionError`.
#[async_trait]
pub trait RemoteSession: Send {
    fn state(&self) -> SessionState;

    /// Attach to `container_id`, starting in `workdir`, and relay the local
    /// terminal until the session ends.
    async fn attach(&mut self, container_id: &str, workdir: &str) -> Result<SessionExit, AdmError>;
}

/// Non-interactive operations on containers of one host
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run `command` inside the container and collect its output
    async fn exec(&self, container_id: &str, command: &[String]) -> Result<ExecOutput, AdmError>;

    /// Engine-reported state of the container ("running", "exited", ...)
    async fn inspect(&self, container_id: &str) -> Result<String, AdmError>;
}

/// Container ids end up in remote command lines and URL paths
pub(crate) fn validate_container_id(container_id: &str) -> Result<(), AdmError> {
    let valid = !container_id.is_empty()
        && container_id.len() <= 128
        && container_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(AdmError::SessionError(format!(
            "invalid container id '{}'",
            container_id
        )))
    }
}
