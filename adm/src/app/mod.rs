//! Command pipelines

pub mod context;
pub mod enter;
pub mod status;

pub use context::AppContext;
