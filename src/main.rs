use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use simulator::config::{self, Config};
use simulator::container::Runner;
use simulator::docker::{CancelToken, DockerConnector};

#[derive(Parser)]
#[command(name = "simulator", version, about = "Run commands in the simulator container")]
struct Cli {
    /// Config file (defaults to $SIMULATOR_CONFIG or ~/.simulator/config.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Workspace base directory
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<PathBuf>,
    /// Mount scenario, packer and terraform sources from the workspace
    #[arg(long, global = true)]
    dev: bool,
    /// Container image to run
    #[arg(long, global = true, value_name = "IMAGE")]
    image: Option<String>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command inside a fresh simulator container
    Run {
        /// Command and arguments; the image default runs when omitted
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    // Container output owns stdout; diagnostics go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = load_config(&cli)?;

    match cli.cmd {
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&cfg)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { command } => {
            let cancel = CancelToken::new();
            cancel_on_interrupt(cancel.clone());

            let runner = Runner::new(cfg.run_config(), DockerConnector::from_env());
            runner.run(&cancel, &command)?;

            if cancel.is_cancelled() {
                return Ok(ExitCode::from(130));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load the config file, then apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = config::load(&path)?;

    if let Some(dir) = &cli.base_dir {
        cfg.base_dir = dir.clone();
    }
    if cli.dev {
        cfg.cli.dev = true;
    }
    if let Some(image) = &cli.image {
        cfg.container.image = image.clone();
    }
    Ok(cfg)
}

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Turn Ctrl-C into a cancellation so the runner unwinds through its
/// cleanup instead of the process dying with a live container.
fn cancel_on_interrupt(cancel: CancelToken) {
    #[cfg(unix)]
    {
        let handler = on_sigint as extern "C" fn(libc::c_int);
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    }

    std::thread::spawn(move || {
        while !INTERRUPTED.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
        }
        cancel.cancel();
    });
}
