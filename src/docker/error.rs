use std::process::ExitStatus;

use thiserror::Error;

/// Failures reported by an [`Engine`](super::Engine) or its connector.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("container engine is unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` produced unexpected output: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("`{command}` timed out")]
    TimedOut { command: String },
}
