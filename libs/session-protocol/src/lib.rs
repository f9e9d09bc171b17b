//! Wire models for the HTTP host agent.
//!
//! The agent proxies a container's standard streams over a websocket and
//! exposes a small REST surface for non-interactive operations.

pub mod models;

pub use models::*;
