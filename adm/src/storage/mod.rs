//! Local configuration and cluster state

pub mod layout;
pub mod settings;
pub mod state;
