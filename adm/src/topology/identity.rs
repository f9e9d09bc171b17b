//! Service identities

use std::fmt;

use serde::Serialize;

use crate::errors::AdmError;
use crate::topology::deploy_config::{DeployConfig, Role};
use crate::utils::{is_short_id, short_digest};

/// Key of a service in the persisted cluster state.
///
/// Derived from the cluster name and the instance id, so it survives
/// re-parsing the same topology across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    pub fn new(cluster: &str, dc_id: &str) -> Self {
        Self(short_digest(&format!("{}_{}", cluster, dc_id)))
    }

    pub fn of(cluster: &str, dc: &DeployConfig) -> Self {
        Self::new(cluster, dc.id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a service id given on the command line.
///
/// Accepts `*`, a short service id, or an instance name (`role_host_sequence`).
pub fn check_id(id: &str) -> Result<(), AdmError> {
    if id == "*" || is_short_id(id) || is_instance_name(id) {
        return Ok(());
    }
    Err(AdmError::InvalidArgument(format!(
        "'{}' is neither a service id nor an instance name",
        id
    )))
}

fn is_instance_name(id: &str) -> bool {
    let Some((role, rest)) = id.split_once('_') else {
        return false;
    };
    let Some((host, sequence)) = rest.rsplit_once('_') else {
        return false;
    };
    Role::parse(role).is_ok() && !host.is_empty() && sequence.parse::<u32>().is_ok()
}
