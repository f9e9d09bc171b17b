//! Host registry: alias → access protocol and connection parameters

pub mod config;
pub mod registry;

pub use config::{HostConfig, HostsDeclaration, HttpConfig, Protocol, SshConfig};
pub use registry::HostRegistry;
