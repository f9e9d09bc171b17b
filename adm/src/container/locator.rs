//! Container locator

use std::sync::Arc;

use tracing::debug;

use crate::errors::AdmError;
use crate::storage::state::StateStore;
use crate::topology::identity::ServiceIdentity;

/// Maps service identities to the id of the container backing them.
///
/// The id comes straight from the state store on every call. A located
/// container may still have been removed since it was recorded.
#[derive(Clone)]
pub struct ContainerLocator {
    store: Arc<dyn StateStore>,
}

impl ContainerLocator {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Container id recorded for `service`
    pub async fn locate(&self, service: &ServiceIdentity) -> Result<String, AdmError> {
        let record = self.store.get(service.as_str()).await?;

        match record.map(|id| id.trim().to_string()) {
            Some(container_id) if !container_id.is_empty() => {
                debug!("Service {} is backed by container {}", service, container_id);
                Ok(container_id)
            }
            _ => Err(AdmError::ContainerNotFound(service.to_string())),
        }
    }
}
