//! Merge policy: which sources are layered, in which order.

pub mod service;

use super::AcpConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the built-in defaults as the lowest layer.
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&AcpConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
