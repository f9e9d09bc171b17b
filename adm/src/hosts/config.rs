//! Host definitions

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SSH_PORT: u16 = 22;

// ================================ DECLARATION ==================================== //

/// Host definitions as handed over by the configuration loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostsDeclaration {
    /// Defaults applied to every host entry
    #[serde(default)]
    pub global: HostDefaults,

    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

/// Values shared by all hosts unless an entry overrides them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostDefaults {
    pub user: Option<String>,
    pub ssh_port: Option<u16>,
    pub private_key_file: Option<PathBuf>,
    pub forward_agent: Option<bool>,
    pub become_user: Option<String>,
    pub protocol: Option<String>,
    pub http_port: Option<u16>,
}

/// One declared host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostEntry {
    /// Alias used by the topology
    pub host: String,

    /// Address the host is reached at
    pub hostname: String,

    pub user: Option<String>,
    pub ssh_port: Option<u16>,
    pub private_key_file: Option<PathBuf>,
    pub forward_agent: Option<bool>,
    pub become_user: Option<String>,

    /// "ssh" (default) or "http"
    pub protocol: Option<String>,

    /// Port of the host agent when `protocol` is "http"
    pub http_port: Option<u16>,

    /// Bearer token presented to the host agent
    pub agent_token: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

// ================================== RESOLVED ===================================== //

/// Access protocol of a host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Remote shell through the local ssh client
    Ssh,

    /// Websocket/REST agent running on the host
    Http,

    /// Anything else found in the host definitions
    Unsupported(String),
}

impl Protocol {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ssh" => Protocol::Ssh,
            "http" => Protocol::Http,
            _ => Protocol::Unsupported(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Http => "http",
            Protocol::Unsupported(s) => s,
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Ssh
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub user: String,
    pub hostname: String,
    pub port: u16,
    pub private_key_file: Option<PathBuf>,
    pub forward_agent: bool,
    pub become_user: Option<String>,
}

impl SshConfig {
    /// `user@hostname` target for the ssh client
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.hostname)
    }
}

/// HTTP agent connection parameters
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub token: Option<SecretString>,
}

impl HttpConfig {
    /// Session endpoint address: `<host-address>:<host-port>`, no scheme
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for HttpConfig {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && match (&self.token, &other.token) {
                (None, None) => true,
                (Some(a), Some(b)) => a.expose_secret() == b.expose_secret(),
                _ => false,
            }
    }
}

impl Eq for HttpConfig {}

/// Everything needed to reach one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub alias: String,
    pub hostname: String,
    pub protocol: Protocol,
    pub ssh: SshConfig,
    http: Option<HttpConfig>,
    pub labels: BTreeMap<String, String>,
}

impl HostConfig {
    pub(crate) fn new(
        alias: String,
        hostname: String,
        protocol: Protocol,
        ssh: SshConfig,
        http: Option<HttpConfig>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            alias,
            hostname,
            protocol,
            ssh,
            http,
            labels,
        }
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// HTTP parameters, present only for `Protocol::Http` hosts
    pub fn http_config(&self) -> Option<&HttpConfig> {
        match self.protocol {
            Protocol::Http => self.http.as_ref(),
            _ => None,
        }
    }
}
