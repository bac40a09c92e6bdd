mod loader;
mod types;

pub use loader::{CONFIG_ENV, default_path, load};
pub use types::{CliConfig, Config, ContainerConfig, DEFAULT_IMAGE, RunConfig, STATE_DIR};
