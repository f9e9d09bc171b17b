//! Service identity → running container

pub mod locator;

pub use locator::ContainerLocator;
