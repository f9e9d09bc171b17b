//! Cluster declaration as handed over by the configuration loader

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form service configuration (`key -> value`)
pub type ConfigMap = BTreeMap<String, serde_json::Value>;

/// The full cluster declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDeclaration {
    /// Cluster name, part of every service identity
    pub cluster: String,

    /// Storage flavor: "bs" (block) or "fs" (file)
    pub kind: String,

    /// Configuration applied to every service
    #[serde(default)]
    pub global: ConfigMap,

    /// Service groups in declaration order
    #[serde(default)]
    pub services: Vec<ServiceGroup>,
}

/// All instances of one role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub role: String,

    /// Overrides the project root directory inside the containers
    #[serde(default)]
    pub root_dir: Option<String>,

    #[serde(default)]
    pub config: ConfigMap,

    #[serde(default)]
    pub deploy: Vec<DeployEntry>,
}

/// Placement of one or more replicas of a role on a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployEntry {
    /// Host alias
    pub host: String,

    /// Number of replicas on this host (default 1)
    #[serde(default)]
    pub instances: Option<u32>,

    /// Sequence of the first replica; the next free sequence if absent
    #[serde(default)]
    pub sequence: Option<u32>,

    #[serde(default)]
    pub config: ConfigMap,
}
