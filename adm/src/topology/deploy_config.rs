//! Concrete service instances

use std::fmt;

use serde::Serialize;

use crate::errors::AdmError;
use crate::topology::declaration::ConfigMap;
use crate::topology::layout::ProjectLayout;
use crate::utils::short_digest;

/// Storage flavor of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Block storage
    Block,

    /// File storage
    File,
}

impl Kind {
    pub fn parse(s: &str) -> Result<Self, AdmError> {
        match s {
            "bs" => Ok(Kind::Block),
            "fs" => Ok(Kind::File),
            _ => Err(AdmError::InvalidTopology(format!(
                "unknown cluster kind '{}', expected 'bs' or 'fs'",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Block => "bs",
            Kind::File => "fs",
        }
    }

    pub fn default_root(&self) -> &'static str {
        match self {
            Kind::Block => "/stratabs",
            Kind::File => "/stratafs",
        }
    }

    /// Roles a cluster of this kind is made of
    pub fn roles(&self) -> &'static [Role] {
        match self {
            Kind::Block => &[Role::Etcd, Role::Mds, Role::Chunkserver, Role::Snapshotclone],
            Kind::File => &[Role::Etcd, Role::Mds, Role::Metaserver],
        }
    }
}

/// Service kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Etcd,
    Mds,
    Chunkserver,
    Snapshotclone,
    Metaserver,
}

impl Role {
    pub fn parse(s: &str) -> Result<Self, AdmError> {
        match s {
            "etcd" => Ok(Role::Etcd),
            "mds" => Ok(Role::Mds),
            "chunkserver" => Ok(Role::Chunkserver),
            "snapshotclone" => Ok(Role::Snapshotclone),
            "metaserver" => Ok(Role::Metaserver),
            _ => Err(AdmError::InvalidTopology(format!("unknown role '{}'", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Etcd => "etcd",
            Role::Mds => "mds",
            Role::Chunkserver => "chunkserver",
            Role::Snapshotclone => "snapshotclone",
            Role::Metaserver => "metaserver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readable instance key, `role_host_sequence`
pub fn instance_name(role: Role, host: &str, sequence: u32) -> String {
    format!("{}_{}_{}", role.as_str(), host, sequence)
}

/// One concrete service instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployConfig {
    kind: Kind,
    role: Role,
    host: String,
    sequence: u32,
    name: String,
    id: String,
    config: ConfigMap,
    layout: ProjectLayout,
}

impl DeployConfig {
    pub(crate) fn new(
        kind: Kind,
        role: Role,
        host: String,
        sequence: u32,
        config: ConfigMap,
        layout: ProjectLayout,
    ) -> Self {
        let name = instance_name(role, &host, sequence);
        let id = short_digest(&name);
        Self {
            kind,
            role,
            host,
            sequence,
            name,
            id,
            config,
            layout,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Host alias
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Readable instance key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stable id derived from (role, host, sequence)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Merged configuration with variables resolved
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn get_config(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }

    pub fn get_config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    pub fn project_layout(&self) -> &ProjectLayout {
        &self.layout
    }
}
