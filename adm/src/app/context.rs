//! Application context

use std::sync::Arc;

use tracing::{debug, info};

use crate::container::ContainerLocator;
use crate::errors::AdmError;
use crate::filesys::file::File;
use crate::hosts::{HostRegistry, HostsDeclaration};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::storage::state::{JsonStateStore, StateStore};
use crate::topology::{self, DeployConfig, TopologyDeclaration};

/// Everything a command needs, resolved once per invocation
pub struct AppContext {
    pub settings: Settings,
    pub hosts: HostRegistry,
    pub cluster: String,

    /// Service instances in topology order
    pub services: Vec<DeployConfig>,

    pub locator: ContainerLocator,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        hosts: &HostsDeclaration,
        topology: &TopologyDeclaration,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, AdmError> {
        let hosts = HostRegistry::load(hosts)?;
        let services = topology::parse(topology, |alias| hosts.contains(alias))?;
        debug!(
            "Cluster {} has {} services on {} hosts",
            topology.cluster,
            services.len(),
            hosts.len()
        );

        Ok(Self {
            settings,
            hosts,
            cluster: topology.cluster.trim().to_string(),
            services,
            locator: ContainerLocator::new(store),
        })
    }

    /// Load settings, host definitions and topology from `layout`
    pub async fn load(layout: &StorageLayout) -> Result<Self, AdmError> {
        let settings: Settings = layout.settings_file().read_json_or_default().await?;
        let hosts: HostsDeclaration = read_required(&layout.hosts_file()).await?;
        let topology: TopologyDeclaration = read_required(&layout.topology_file()).await?;

        info!("Loaded configuration from {}", layout.base_dir.display());
        let store = Arc::new(JsonStateStore::new(layout.containers_file()));
        Self::new(settings, &hosts, &topology, store)
    }
}

async fn read_required<T: serde::de::DeserializeOwned>(file: &File) -> Result<T, AdmError> {
    match file.read_json_opt().await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(AdmError::ConfigError(format!(
            "{} does not exist",
            file.path().display()
        ))),
        Err(e) => Err(AdmError::ConfigError(format!(
            "failed to read {}: {}",
            file.path().display(),
            e
        ))),
    }
}
