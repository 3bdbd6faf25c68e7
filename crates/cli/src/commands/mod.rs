//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_daemon;
pub use validate::run_validate;

use contracts::DaemonConfig;
use tracing::info;

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Load the primary file layered over the optional fragment directory
fn load_config(args: &ConfigArgs) -> Result<DaemonConfig> {
    info!(
        config = %args.config.display(),
        conf_dir = ?args.conf_dir,
        "Loading configuration"
    );
    config_loader::ConfigLoader::load_with_conf_dir(&args.config, args.conf_dir.as_deref())
        .map_err(|e| CliError::config_load(args.config.display().to_string(), e))
}
