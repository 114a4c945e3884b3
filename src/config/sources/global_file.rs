//! Global config file source: $XDG_CONFIG_HOME/acp/config.toml

use crate::config::paths;
use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use tracing::debug;

/// Add the global config file, if one exists, to the builder.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match paths::global_config_path() {
        Ok(path) => {
            debug!(path = %path.display(), "Layering global config file");
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        Err(_) => builder,
    }
}
