//! Ghost core library: domain types, container naming, instance registry,
//! port allocation and persisted settings.
//!
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`CoreError`]
//! - [`registry`]: in-memory [`InstanceRegistry`]
//! - [`ports`]: host port allocation
//! - [`settings`]: `~/.ghost/config.yaml` load / save

pub mod error;
pub mod ports;
pub mod registry;
pub mod settings;
pub mod types;

pub use error::CoreError;
pub use ports::{OsPortAllocator, PortAllocator};
pub use registry::InstanceRegistry;
pub use settings::{Settings, SmtpSettings};
pub use types::{
    ContainerName, ContainerStats, InstanceRecord, InstanceState, ProjectName, ProjectStatus,
    CONTAINER_PORT, CONTAINER_WORKDIR, NAMESPACE_PREFIX,
};
