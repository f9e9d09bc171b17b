//! Host registry

use std::collections::HashMap;

use secrecy::SecretString;
use tracing::debug;

use crate::errors::AdmError;
use crate::hosts::config::{
    HostConfig, HostDefaults, HostEntry, HostsDeclaration, HttpConfig, Protocol, SshConfig,
    DEFAULT_SSH_PORT,
};

/// Read-only lookup of host aliases.
///
/// Built once per invocation; safe to share between tasks.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Vec<HostConfig>,
    index: HashMap<String, usize>,
}

impl HostRegistry {
    /// Build the registry from already-parsed host definitions
    pub fn load(decl: &HostsDeclaration) -> Result<Self, AdmError> {
        let mut hosts = Vec::with_capacity(decl.hosts.len());
        let mut index = HashMap::with_capacity(decl.hosts.len());

        for entry in &decl.hosts {
            let host = resolve_entry(&decl.global, entry)?;
            if index.contains_key(&host.alias) {
                return Err(AdmError::InvalidHosts(format!(
                    "duplicate host alias '{}'",
                    host.alias
                )));
            }
            debug!("Loaded host {} ({}, {})", host.alias, host.hostname, host.protocol);
            index.insert(host.alias.clone(), hosts.len());
            hosts.push(host);
        }

        Ok(Self { hosts, index })
    }

    /// Look up a host by alias
    pub fn resolve(&self, alias: &str) -> Result<&HostConfig, AdmError> {
        self.index
            .get(alias)
            .map(|&i| &self.hosts[i])
            .ok_or_else(|| AdmError::HostNotFound(alias.to_string()))
    }

    /// Aliases in declaration order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(|h| h.alias.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.index.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

fn resolve_entry(global: &HostDefaults, entry: &HostEntry) -> Result<HostConfig, AdmError> {
    let alias = entry.host.trim();
    if alias.is_empty() {
        return Err(AdmError::InvalidHosts("host alias must not be empty".to_string()));
    }

    let hostname = entry.hostname.trim();
    if hostname.is_empty() {
        return Err(AdmError::InvalidHosts(format!(
            "host '{}' has no hostname",
            alias
        )));
    }

    let protocol = entry
        .protocol
        .as_deref()
        .or(global.protocol.as_deref())
        .map(Protocol::parse)
        .unwrap_or_default();

    let user = entry
        .user
        .clone()
        .or_else(|| global.user.clone())
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "root".to_string());

    let ssh = SshConfig {
        user,
        hostname: hostname.to_string(),
        port: entry.ssh_port.or(global.ssh_port).unwrap_or(DEFAULT_SSH_PORT),
        private_key_file: entry
            .private_key_file
            .clone()
            .or_else(|| global.private_key_file.clone()),
        forward_agent: entry.forward_agent.or(global.forward_agent).unwrap_or(false),
        become_user: entry
            .become_user
            .clone()
            .or_else(|| global.become_user.clone())
            .filter(|u| !u.is_empty()),
    };

    let http = match entry.http_port.or(global.http_port) {
        Some(port) => Some(HttpConfig {
            host: hostname.to_string(),
            port,
            token: entry
                .agent_token
                .clone()
                .map(|t| SecretString::new(t.into_boxed_str())),
        }),
        None if protocol == Protocol::Http => {
            return Err(AdmError::InvalidHosts(format!(
                "host '{}' uses the http protocol but has no http_port",
                alias
            )));
        }
        None => None,
    };

    Ok(HostConfig::new(
        alias.to_string(),
        hostname.to_string(),
        protocol,
        ssh,
        http,
        entry.labels.clone(),
    ))
}
