//! Container engine access: the [`ContainerEngine`] interface, the Podman CLI
//! client, an in-memory fake, and the availability gate.

mod command;
pub mod engine;
mod error;
pub mod fake;
pub mod gate;
pub mod podman;

pub use command::{exec, CommandOutput};
pub use engine::{ContainerEngine, Mount, PortMapping, RecoveryAction, RunSpec};
pub use error::EngineError;
pub use fake::{EngineCall, FakeEngine};
pub use gate::EngineGate;
pub use podman::PodmanEngine;
