use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::engine::{Connector, Engine};
use super::error::EngineError;
use super::types::{
    AttachOptions, CancelToken, ContainerId, ContainerSpec, MountSpec, StreamHandle,
};

/// Environment variable naming the docker binary to drive.
pub const DOCKER_BIN_ENV: &str = "SIMULATOR_DOCKER";

const DEFAULT_PROGRAM: &str = "docker";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Connects a [`DockerCli`] to the daemon selected by the ambient docker
/// environment (`DOCKER_HOST`, `DOCKER_CONTEXT`, ...).
#[derive(Debug, Clone)]
pub struct DockerConnector {
    program: String,
}

impl DockerConnector {
    /// Use `$SIMULATOR_DOCKER`, falling back to `docker` on `PATH`.
    pub fn from_env() -> Self {
        let program = std::env::var(DOCKER_BIN_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
        Self { program }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Connector for DockerConnector {
    type Engine = DockerCli;

    fn connect(&self) -> Result<DockerCli, EngineError> {
        let cli = DockerCli::new(self.program.clone());
        cli.ensure_available()?;
        Ok(cli)
    }
}

/// [`Engine`] implemented on top of the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Verify that the Docker daemon is reachable.
    pub fn ensure_available(&self) -> Result<(), EngineError> {
        let status = Command::new(&self.program)
            .args(["version", "--format", "{{.Server.Version}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| EngineError::Unavailable {
                reason: format!(
                    "failed to invoke `{}` ({e}); is it installed and on PATH?",
                    self.program
                ),
            })?;

        if !status.success() {
            return Err(EngineError::Unavailable {
                reason: format!("docker daemon is not running ({status})"),
            });
        }
        Ok(())
    }

    fn render(&self, args: &[String]) -> String {
        let argv = std::iter::once(self.program.as_str()).chain(args.iter().map(String::as_str));
        shell_words::join(argv)
    }

    /// Run one docker subcommand to completion and return its stdout.
    ///
    /// The child is polled so that a fired token kills it instead of
    /// leaving the caller blocked on a hung daemon.
    fn exec(
        &self,
        args: &[String],
        envs: &[(String, String)],
        cancel: &CancelToken,
    ) -> Result<String, EngineError> {
        let command = self.render(args);
        if cancel.is_cancelled() {
            return Err(interrupted(command, cancel));
        }
        tracing::debug!(%command, "running docker");

        let mut child = docker_command(&self.program)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Readers run on their own threads so a chatty child can't fill a
        // pipe and stall while we poll.
        let stdout = child.stdout.take().map(read_all);
        let stderr = child.stderr.take().map(read_all);

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Spawn {
                        program: self.program.clone(),
                        source,
                    });
                }
            }

            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(interrupted(command, cancel));
            }

            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.map(join_output).unwrap_or_default();
        let stderr = stderr.map(join_output).unwrap_or_default();

        if !status.success() {
            return Err(EngineError::Command {
                command,
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl Engine for DockerCli {
    fn create(
        &self,
        spec: &ContainerSpec,
        cancel: &CancelToken,
    ) -> Result<ContainerId, EngineError> {
        let stdout = self.exec(&create_args(spec), &env_values(&spec.env), cancel)?;
        let id = stdout.lines().last().unwrap_or_default().trim();
        if id.is_empty() {
            return Err(EngineError::UnexpectedOutput {
                command: "docker create".to_string(),
                output: stdout,
            });
        }
        Ok(ContainerId::new(id))
    }

    fn attach(
        &self,
        id: &ContainerId,
        opts: AttachOptions,
        cancel: &CancelToken,
    ) -> Result<StreamHandle, EngineError> {
        let args = vec![
            "container".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{.Id}}".to_string(),
            id.to_string(),
        ];
        self.exec(&args, &[], cancel)?;

        Ok(StreamHandle::new(LogFollower {
            program: self.program.clone(),
            args: follow_args(id, opts),
            child: None,
            stdout: None,
        }))
    }

    fn start(&self, id: &ContainerId, cancel: &CancelToken) -> Result<(), EngineError> {
        self.exec(&["start".to_string(), id.to_string()], &[], cancel)
            .map(drop)
    }

    fn stop(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        self.exec(&stop_args(id, timeout), &[], cancel).map(drop)
    }

    fn remove(&self, id: &ContainerId, cancel: &CancelToken) -> Result<(), EngineError> {
        self.exec(&["rm".to_string(), id.to_string()], &[], cancel)
            .map(drop)
    }
}

/// Output of an attached container.
///
/// The CLI refuses to attach to a container that has not been started, so
/// `docker logs --follow` is spawned on the first read instead. It replays
/// from container start, which means nothing written before the first read
/// is lost.
struct LogFollower {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl LogFollower {
    fn spawn(&mut self) -> io::Result<()> {
        let mut child = docker_command(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }
}

impl Read for LogFollower {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.child.is_none() {
            self.spawn()?;
        }
        match self.stdout.as_mut() {
            Some(out) => out.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for LogFollower {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// A docker invocation in its own process group, so a terminal Ctrl-C
/// reaches only this process and cancellation decides what gets killed.
fn docker_command(program: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
    cmd
}

fn interrupted(command: String, cancel: &CancelToken) -> EngineError {
    if cancel.is_expired() {
        EngineError::TimedOut { command }
    } else {
        EngineError::Cancelled { command }
    }
}

fn read_all(mut source: impl Read + Send + 'static) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Argument list for `docker create`.
///
/// Environment entries are passed by name only; their values travel on the
/// child's environment (see [`env_values`]) so they never appear in argv.
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];
    if spec.tty {
        args.push("--tty".into());
    }
    if spec.attach_stdout {
        args.extend(["--attach", "stdout"].map(String::from));
    }
    if spec.attach_stderr {
        args.extend(["--attach", "stderr"].map(String::from));
    }
    for mount in &spec.mounts {
        args.extend(["--mount".to_string(), mount_arg(mount)]);
    }
    for entry in &spec.env {
        let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k);
        args.extend(["--env".to_string(), key.to_string()]);
    }
    args.push(spec.image.clone());
    args.extend(spec.cmd.iter().cloned());
    args
}

/// `KEY=VALUE` entries split into pairs for the child environment. Entries
/// without a value are left to docker's own environment lookup.
pub fn env_values(env: &[String]) -> Vec<(String, String)> {
    env.iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Render a bind mount as a `--mount` value.
pub fn mount_arg(mount: &MountSpec) -> String {
    let mut arg = format!(
        "type=bind,{},{}",
        csv_field("source", &mount.source.to_string_lossy()),
        csv_field("target", &mount.target),
    );
    if mount.read_only {
        arg.push_str(",readonly");
    }
    arg
}

// `--mount` is parsed as CSV, so a path containing a comma or quote has to
// be quoted as a whole field.
fn csv_field(key: &str, value: &str) -> String {
    if value.contains([',', '"']) {
        format!("\"{key}={}\"", value.replace('"', "\"\""))
    } else {
        format!("{key}={value}")
    }
}

fn stop_args(id: &ContainerId, timeout: Option<Duration>) -> Vec<String> {
    let mut args = vec!["stop".to_string()];
    if let Some(t) = timeout {
        args.extend(["--time".to_string(), t.as_secs().to_string()]);
    }
    args.push(id.to_string());
    args
}

fn follow_args(id: &ContainerId, opts: AttachOptions) -> Vec<String> {
    let mut args = vec!["logs".to_string()];
    if opts.stream {
        args.push("--follow".into());
    }
    args.push(id.to_string());
    args
}
