// Container-engine seam — the engine contract and its docker CLI backend.

pub mod cli;
pub mod engine;
pub mod error;
pub mod types;

pub use cli::{DockerCli, DockerConnector};
pub use engine::{Connector, Engine};
pub use error::EngineError;
pub use types::{
    AttachOptions, CancelToken, ContainerId, ContainerSpec, MountSpec, StreamHandle,
};
