use std::time::Duration;

use super::error::EngineError;
use super::types::{AttachOptions, CancelToken, ContainerId, ContainerSpec, StreamHandle};

/// Container-engine operations used by the runner.
///
/// Every call is synchronous. Calls taking a [`CancelToken`] abort and
/// return [`EngineError::Cancelled`] (or [`EngineError::TimedOut`] for an
/// expired deadline) once the token fires.
pub trait Engine: Send + Sync {
    fn create(
        &self,
        spec: &ContainerSpec,
        cancel: &CancelToken,
    ) -> Result<ContainerId, EngineError>;

    fn attach(
        &self,
        id: &ContainerId,
        opts: AttachOptions,
        cancel: &CancelToken,
    ) -> Result<StreamHandle, EngineError>;

    fn start(&self, id: &ContainerId, cancel: &CancelToken) -> Result<(), EngineError>;

    /// `timeout` is the grace period before the engine kills the container;
    /// `None` uses the engine default.
    fn stop(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<(), EngineError>;

    fn remove(&self, id: &ContainerId, cancel: &CancelToken) -> Result<(), EngineError>;
}

/// Builds an [`Engine`] from whatever environment it is bound to.
pub trait Connector {
    type Engine: Engine;

    fn connect(&self) -> Result<Self::Engine, EngineError>;
}

impl<C: Connector> Connector for &C {
    type Engine = C::Engine;

    fn connect(&self) -> Result<Self::Engine, EngineError> {
        (**self).connect()
    }
}
