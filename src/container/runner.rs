use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::config::RunConfig;
use crate::docker::{
    AttachOptions, CancelToken, Connector, ContainerId, ContainerSpec, Engine, EngineError,
    StreamHandle,
};

use super::mounts::build_mounts;
use super::workspace::aws_env_from_process;

/// Ceiling for stopping and removing a container, independent of the
/// caller's token.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const WAIT_POLL: Duration = Duration::from_millis(50);
const CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("unable to determine your home directory")]
    HomeNotFound,
    #[error("unable to create docker client")]
    ClientUnavailable(#[source] EngineError),
    #[error("unable to create simulator container")]
    CreateFailed(#[source] EngineError),
    #[error("unable to attach to simulator container")]
    AttachFailed(#[source] EngineError),
    #[error("unable to start simulator container")]
    StartFailed(#[source] EngineError),
    #[error("simulator run was cancelled")]
    Cancelled,
}

type HomeResolver = Box<dyn Fn() -> Option<PathBuf> + Send + Sync>;
type OutputFactory = Box<dyn Fn() -> Box<dyn Write + Send> + Send + Sync>;

/// Runs one command per call in a fresh simulator container.
///
/// Each [`Runner::run`] creates exactly one container and, once creation
/// succeeds, always stops and then removes it before returning.
pub struct Runner<C> {
    config: RunConfig,
    connector: C,
    env: Vec<String>,
    home: HomeResolver,
    output: OutputFactory,
}

impl<C: Connector> Runner<C> {
    /// A runner that resolves `$HOME`, forwards the host's AWS environment
    /// and writes container output to stdout.
    pub fn new(config: RunConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            env: aws_env_from_process(),
            home: Box::new(dirs::home_dir),
            output: Box::new(|| -> Box<dyn Write + Send> { Box::new(io::stdout()) }),
        }
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_home_resolver(
        mut self,
        resolve: impl Fn() -> Option<PathBuf> + Send + Sync + 'static,
    ) -> Self {
        self.home = Box::new(resolve);
        self
    }

    /// Send container output to a writer produced per run instead of stdout.
    pub fn with_output<W, F>(mut self, make: F) -> Self
    where
        W: Write + Send + 'static,
        F: Fn() -> W + Send + Sync + 'static,
    {
        self.output = Box::new(move || -> Box<dyn Write + Send> { Box::new(make()) });
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `command` in a new container and stream its output until it
    /// closes.
    ///
    /// `cancel` governs create, attach, start and the wait for output. It
    /// never governs cleanup.
    pub fn run(&self, cancel: &CancelToken, command: &[String]) -> Result<(), RunError> {
        let home = (self.home)().ok_or(RunError::HomeNotFound)?;
        let engine = self
            .connector
            .connect()
            .map_err(RunError::ClientUnavailable)?;

        let spec = ContainerSpec {
            image: self.config.image.clone(),
            env: self.env.clone(),
            cmd: command.to_vec(),
            tty: true,
            attach_stdout: true,
            attach_stderr: true,
            mounts: build_mounts(&self.config.base_dir, &home, self.config.dev),
        };

        let id = engine
            .create(&spec, cancel)
            .map_err(RunError::CreateFailed)?;
        tracing::info!(
            %id,
            image = %spec.image,
            dev = self.config.dev,
            "created simulator container"
        );

        let _cleanup = CleanupGuard {
            engine: &engine,
            id: id.clone(),
            stop_timeout: self.config.stop_timeout,
        };

        let stream = engine
            .attach(&id, AttachOptions::combined(), cancel)
            .map_err(RunError::AttachFailed)?;

        engine.start(&id, cancel).map_err(RunError::StartFailed)?;
        tracing::info!(%id, "started simulator container");

        let done = spawn_drain(stream, (self.output)());
        wait_for_drain(&done, cancel)
    }
}

/// Stops then removes a created container when dropped, on every exit path
/// including unwinding.
struct CleanupGuard<'a, E: Engine> {
    engine: &'a E,
    id: ContainerId,
    stop_timeout: Option<Duration>,
}

impl<E: Engine> Drop for CleanupGuard<'_, E> {
    fn drop(&mut self) {
        let cancel = CancelToken::with_timeout(CLEANUP_TIMEOUT);

        if let Err(error) = self.engine.stop(&self.id, self.stop_timeout, &cancel) {
            tracing::warn!(id = %self.id, %error, "failed to stop container");
        }

        if let Err(error) = self.engine.remove(&self.id, &cancel) {
            tracing::warn!(id = %self.id, %error, "failed to remove container");
        } else {
            tracing::debug!(id = %self.id, "removed simulator container");
        }
    }
}

/// Copy the stream into `sink` on a background thread. The receiver gets a
/// message once the stream closes or a read/write fails.
fn spawn_drain(stream: StreamHandle, mut sink: Box<dyn Write + Send>) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = stream.into_reader();
        forward(&mut reader, &mut sink);
        let _ = tx.send(());
    });
    rx
}

/// Best-effort passthrough: stops at EOF or on the first error, flushing
/// each chunk so interactive output shows up as it arrives.
fn forward(reader: &mut dyn Read, sink: &mut dyn Write) {
    let mut buf = [0u8; CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        if sink.write_all(&buf[..n]).and_then(|()| sink.flush()).is_err() {
            break;
        }
    }
}

fn wait_for_drain(done: &Receiver<()>, cancel: &CancelToken) -> Result<(), RunError> {
    loop {
        match done.recv_timeout(WAIT_POLL) {
            // A disconnected channel means the drain thread is gone.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
    }
}
