//! Frame and REST models

use serde::{Deserialize, Serialize};

/// Frame sent from the admin tool to the agent over the attach channel.
///
/// Byte payloads are base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Keystrokes for the container process
    Stdin { data: String },

    /// Local stdin reached end of file
    StdinClose,

    /// Local terminal size changed
    Resize { cols: u16, rows: u16 },

    /// Deliver a signal (e.g. "SIGTERM") to the container process
    Signal { name: String },

    /// Leave the container process running and end the session
    Detach,
}

/// Frame sent from the agent to the admin tool over the attach channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentFrame {
    Stdout { data: String },

    Stderr { data: String },

    /// The container process exited
    Exit { code: Option<i32> },

    /// The agent rejected or aborted the session
    Error { message: String },
}

/// Query parameters of the attach endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachParams {
    pub session_id: String,
    pub workdir: String,
    pub cols: u16,
    pub rows: u16,
}

/// Body of `POST /containers/{id}/exec`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

/// Response of `POST /containers/{id}/exec`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResponse {
    pub exit_code: i32,

    #[serde(default)]
    pub stdout: String,

    #[serde(default)]
    pub stderr: String,
}

/// Response of `GET /containers/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub status: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}
