//! Transport selection

use tracing::debug;

use crate::errors::AdmError;
use crate::hosts::{HostConfig, Protocol};
use crate::session::http::{AgentEndpoint, HttpSession};
use crate::session::shell::{ShellSession, ShellTarget};
use crate::session::{RemoteExecutor, RemoteSession};
use crate::storage::settings::Settings;

/// Builds transports for hosts
pub trait SessionFactory: Send + Sync {
    /// Fresh interactive session to `host`
    fn session(&self, host: &HostConfig) -> Result<Box<dyn RemoteSession>, AdmError>;

    /// Non-interactive access to the containers of `host`
    fn executor(&self, host: &HostConfig) -> Result<Box<dyn RemoteExecutor>, AdmError>;
}

/// Picks the shell or HTTP transport from the host's protocol
#[derive(Debug, Clone)]
pub struct TransportFactory {
    settings: Settings,
}

enum Transport {
    Shell(ShellTarget),
    Http(AgentEndpoint),
}

impl TransportFactory {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn transport(&self, host: &HostConfig) -> Result<Transport, AdmError> {
        debug!("Host {} uses protocol {}", host.alias, host.protocol());
        match host.protocol() {
            Protocol::Ssh => Ok(Transport::Shell(ShellTarget::new(
                host.ssh.clone(),
                &self.settings,
            ))),
            Protocol::Http => {
                let http = host.http_config().ok_or_else(|| {
                    AdmError::InvalidHosts(format!("host {} has no agent port", host.alias))
                })?;
                Ok(Transport::Http(AgentEndpoint::new(http.clone(), &self.settings)?))
            }
            Protocol::Unsupported(name) => Err(AdmError::ProtocolUnsupported(name.clone())),
        }
    }
}

impl SessionFactory for TransportFactory {
    fn session(&self, host: &HostConfig) -> Result<Box<dyn RemoteSession>, AdmError> {
        Ok(match self.transport(host)? {
            Transport::Shell(target) => Box::new(ShellSession::new(target)),
            Transport::Http(endpoint) => Box::new(HttpSession::new(endpoint)),
        })
    }

    fn executor(&self, host: &HostConfig) -> Result<Box<dyn RemoteExecutor>, AdmError> {
        Ok(match self.transport(host)? {
            Transport::Shell(target) => Box::new(target),
            Transport::Http(endpoint) => Box::new(endpoint),
        })
    }
}
