//! Service selection

use tracing::debug;

use crate::errors::AdmError;
use crate::topology::deploy_config::DeployConfig;
use crate::topology::identity::ServiceIdentity;

/// One field of a filter query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Match {
    /// Matches anything (`*`)
    #[default]
    Any,
    Exact(String),
}

impl Match {
    pub fn parse(s: &str) -> Self {
        if s == "*" {
            Match::Any
        } else {
            Match::Exact(s.to_string())
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Match::Any => true,
            Match::Exact(expected) => expected == value,
        }
    }
}

/// Conjunctive query over id, role and host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOption {
    /// Service identity or instance name
    pub id: Match,
    pub role: Match,
    /// Host alias
    pub host: Match,
}

impl FilterOption {
    /// Matches every service
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self {
            id: Match::parse(id),
            ..Self::default()
        }
    }

    fn matches(&self, cluster: &str, dc: &DeployConfig) -> bool {
        let id_matches = match &self.id {
            Match::Any => true,
            Match::Exact(id) => {
                id == dc.name() || id == ServiceIdentity::of(cluster, dc).as_str()
            }
        };
        id_matches && self.role.matches(dc.role().as_str()) && self.host.matches(dc.host())
    }
}

/// Services matching `option`, in topology order.
///
/// May be empty; callers that need a target use [`select_one`] or
/// [`select_nonempty`].
pub fn select<'a>(
    cluster: &str,
    configs: &'a [DeployConfig],
    option: &FilterOption,
) -> Vec<&'a DeployConfig> {
    configs
        .iter()
        .filter(|dc| option.matches(cluster, dc))
        .collect()
}

/// Matching services, `NoServicesMatched` when there are none
pub fn select_nonempty<'a>(
    cluster: &str,
    configs: &'a [DeployConfig],
    option: &FilterOption,
) -> Result<Vec<&'a DeployConfig>, AdmError> {
    let selected = select(cluster, configs, option);
    if selected.is_empty() {
        return Err(AdmError::NoServicesMatched);
    }
    Ok(selected)
}

/// Target of a single-target operation: the first match in topology order
pub fn select_one<'a>(
    cluster: &str,
    configs: &'a [DeployConfig],
    option: &FilterOption,
) -> Result<&'a DeployConfig, AdmError> {
    let selected = select_nonempty(cluster, configs, option)?;
    if selected.len() > 1 {
        debug!(
            "{} services matched, using the first one ({})",
            selected.len(),
            selected[0].name()
        );
    }
    Ok(selected[0])
}
