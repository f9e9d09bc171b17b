//! stratadm library
//!
//! Resolves a service of a storage cluster topology down to the container
//! running it, and opens sessions to that container over ssh or through the
//! host agent.

pub mod app;
pub mod container;
pub mod errors;
pub mod filesys;
pub mod hosts;
pub mod logs;
pub mod session;
pub mod storage;
pub mod topology;
pub mod utils;
