//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Container engine binary on the hosts ("docker" or "podman")
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Privilege prefix for engine commands; empty to run without one
    #[serde(default = "default_sudo_alias")]
    pub sudo_alias: String,

    /// Shell transport settings
    #[serde(default)]
    pub ssh: SshSettings,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Maximum number of hosts contacted at once by multi-target commands
    #[serde(default = "default_status_concurrency")]
    pub status_concurrency: usize,
}

fn default_engine() -> String {
    "docker".to_string()
}

fn default_sudo_alias() -> String {
    "sudo".to_string()
}

fn default_status_concurrency() -> usize {
    8
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            engine: default_engine(),
            sudo_alias: default_sudo_alias(),
            ssh: SshSettings::default(),
            http: HttpSettings::default(),
            status_concurrency: default_status_concurrency(),
        }
    }
}

/// Shell transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Local ssh client binary
    #[serde(default = "default_ssh_binary")]
    pub binary: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Verify host keys against known_hosts
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: default_ssh_binary(),
            connect_timeout_secs: default_connect_timeout(),
            strict_host_key_checking: false,
        }
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for non-interactive requests in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}
