//! Directory conventions of a service inside its container

use serde::Serialize;

use crate::errors::AdmError;
use crate::topology::deploy_config::{Kind, Role};

/// Directory layout of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    /// e.g. `/stratabs`
    pub project_root: String,

    /// e.g. `/stratabs/mds`
    pub service_root_dir: String,
    pub service_conf_dir: String,
    pub service_log_dir: String,
    pub service_data_dir: String,
    pub service_bin_dir: String,

    /// Cluster tools shared by all roles, e.g. `/stratabs/tools`
    pub tools_dir: String,
}

impl ProjectLayout {
    pub fn new(kind: Kind, role: Role, root_dir: Option<&str>) -> Result<Self, AdmError> {
        let project_root = match root_dir {
            Some(dir) => validate_root_dir(dir)?,
            None => kind.default_root().to_string(),
        };
        let service_root_dir = format!("{}/{}", project_root, role.as_str());

        Ok(Self {
            service_conf_dir: format!("{}/conf", service_root_dir),
            service_log_dir: format!("{}/logs", service_root_dir),
            service_data_dir: format!("{}/data", service_root_dir),
            service_bin_dir: format!("{}/sbin", service_root_dir),
            tools_dir: format!("{}/tools", project_root),
            service_root_dir,
            project_root,
        })
    }
}

/// Normalizes a `root_dir` directive: absolute, not `/`, segments made of
/// `[A-Za-z0-9._-]` only and never `.` or `..`, trailing slash dropped.
fn validate_root_dir(dir: &str) -> Result<String, AdmError> {
    let malformed = |why: &str| {
        AdmError::InvalidTopology(format!("malformed root_dir '{}': {}", dir, why))
    };

    let trimmed = dir.trim_end_matches('/');
    if !dir.starts_with('/') {
        return Err(malformed("must be an absolute path"));
    }
    if trimmed.is_empty() {
        return Err(malformed("must not be the filesystem root"));
    }
    for segment in trimmed[1..].split('/') {
        match segment {
            "" => return Err(malformed("empty path segment")),
            "." | ".." => return Err(malformed("relative path segment")),
            s if !s.bytes().all(is_path_byte) => {
                return Err(malformed("unsupported character in path"))
            }
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}

fn is_path_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}
