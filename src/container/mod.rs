// Simulator container runs — mount topology, cloud environment, lifecycle.

pub mod mounts;
pub mod runner;
pub mod workspace;

pub use mounts::build_mounts;
pub use runner::{CLEANUP_TIMEOUT, RunError, Runner};
