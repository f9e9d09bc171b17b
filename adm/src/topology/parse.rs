//! Topology expansion and validation

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::errors::AdmError;
use crate::topology::declaration::{ConfigMap, DeployEntry, TopologyDeclaration};
use crate::topology::deploy_config::{instance_name, DeployConfig, Kind, Role};
use crate::topology::identity::ServiceIdentity;
use crate::topology::layout::ProjectLayout;
use crate::topology::variables::Variables;

/// Upper bound of `instances` in one deploy entry
pub const MAX_INSTANCES: u32 = 256;

/// Expand a cluster declaration into its service instances.
///
/// Instances come out in declaration order: groups, then deploy entries, then
/// replicas. `is_known_host` decides whether a host alias exists. The result
/// depends on nothing but the inputs, so repeated parses yield the same ids.
pub fn parse<F>(decl: &TopologyDeclaration, is_known_host: F) -> Result<Vec<DeployConfig>, AdmError>
where
    F: Fn(&str) -> bool,
{
    let cluster = decl.cluster.trim();
    if cluster.is_empty() {
        return Err(AdmError::InvalidTopology("cluster name must not be empty".to_string()));
    }

    let kind = Kind::parse(decl.kind.trim())?;
    if decl.services.is_empty() {
        return Err(AdmError::InvalidTopology("no services declared".to_string()));
    }

    let mut used: HashMap<(Role, String), BTreeSet<u32>> = HashMap::new();
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut identities: HashMap<String, String> = HashMap::new();
    let mut configs = Vec::new();

    for group in &decl.services {
        let role = Role::parse(group.role.trim())?;
        if !kind.roles().contains(&role) {
            return Err(AdmError::InvalidTopology(format!(
                "role '{}' is not part of a '{}' cluster",
                role,
                kind.as_str()
            )));
        }
        if group.deploy.is_empty() {
            return Err(AdmError::InvalidTopology(format!(
                "role '{}' has no deploy entries",
                role
            )));
        }

        let layout = ProjectLayout::new(kind, role, group.root_dir.as_deref())?;

        for entry in &group.deploy {
            let host = entry.host.trim();
            if host.is_empty() {
                return Err(AdmError::InvalidTopology(format!(
                    "role '{}' has a deploy entry without host",
                    role
                )));
            }
            if !is_known_host(host) {
                return Err(AdmError::InvalidTopology(format!(
                    "role '{}' references unknown host '{}'",
                    role, host
                )));
            }

            let sequences = used.entry((role, host.to_string())).or_default();
            for sequence in entry_sequences(role, host, entry, sequences)? {
                let config = merge_config(&decl.global, &group.config, &entry.config);
                let config = render_config(config, cluster, role, host, sequence, &layout)?;
                let dc = DeployConfig::new(
                    kind,
                    role,
                    host.to_string(),
                    sequence,
                    config,
                    layout.clone(),
                );
                claim(&mut ids, "instance id", dc.id(), dc.name())?;
                let identity = ServiceIdentity::of(cluster, &dc);
                claim(&mut identities, "service id", identity.as_str(), dc.name())?;

                debug!("Expanded {} ({})", dc.name(), identity);
                configs.push(dc);
            }
        }
    }

    Ok(configs)
}

/// Sequences of the replicas of one deploy entry, recorded into `used`
fn entry_sequences(
    role: Role,
    host: &str,
    entry: &DeployEntry,
    used: &mut BTreeSet<u32>,
) -> Result<Vec<u32>, AdmError> {
    let instances = entry.instances.unwrap_or(1);
    if instances == 0 || instances > MAX_INSTANCES {
        return Err(AdmError::InvalidTopology(format!(
            "role '{}' on host '{}' declares {} instances, expected 1 to {}",
            role, host, instances, MAX_INSTANCES
        )));
    }

    let start = match entry.sequence {
        Some(sequence) => sequence,
        None => used.last().map_or(0, |last| last + 1),
    };

    let mut sequences = Vec::with_capacity(instances as usize);
    for i in 0..instances {
        let sequence = start.checked_add(i).ok_or_else(|| {
            AdmError::InvalidTopology(format!(
                "sequence overflow for role '{}' on host '{}'",
                role, host
            ))
        })?;
        if !used.insert(sequence) {
            return Err(AdmError::InvalidTopology(format!(
                "duplicate service instance '{}'",
                instance_name(role, host, sequence)
            )));
        }
        sequences.push(sequence);
    }
    Ok(sequences)
}

/// Record `key` as taken by `name`; a second claim is a collision
fn claim(
    taken: &mut HashMap<String, String>,
    what: &str,
    key: &str,
    name: &str,
) -> Result<(), AdmError> {
    match taken.insert(key.to_string(), name.to_string()) {
        Some(previous) if previous != name => Err(AdmError::InvalidTopology(format!(
            "{} {} of '{}' collides with '{}'",
            what, key, name, previous
        ))),
        Some(_) => Err(AdmError::InvalidTopology(format!(
            "duplicate service instance '{}'",
            name
        ))),
        None => Ok(()),
    }
}

fn merge_config(global: &ConfigMap, group: &ConfigMap, entry: &ConfigMap) -> ConfigMap {
    let mut merged = global.clone();
    merged.extend(group.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.extend(entry.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn render_config(
    mut config: ConfigMap,
    cluster: &str,
    role: Role,
    host: &str,
    sequence: u32,
    layout: &ProjectLayout,
) -> Result<ConfigMap, AdmError> {
    let variables = Variables::new()
        .with("cluster", cluster)
        .with("service_role", role)
        .with("service_host", host)
        .with("service_sequence", sequence)
        .with("service_name", instance_name(role, host, sequence))
        .with("service_root_dir", &layout.service_root_dir);
    variables.render_config(&mut config)?;
    Ok(config)
}
