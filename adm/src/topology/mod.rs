//! Cluster topology: declaration, instances, identities and selection

pub mod declaration;
pub mod deploy_config;
pub mod filter;
pub mod identity;
pub mod layout;
pub mod parse;
pub mod variables;

pub use declaration::{ConfigMap, DeployEntry, ServiceGroup, TopologyDeclaration};
pub use deploy_config::{DeployConfig, Kind, Role};
pub use filter::{select, select_nonempty, select_one, FilterOption, Match};
pub use identity::{check_id, ServiceIdentity};
pub use layout::ProjectLayout;
pub use parse::parse;
