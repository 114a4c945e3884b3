//! Environment variable source: ACP_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Add environment variable overlay to builder.
/// Uses ACP_ prefix and __ as separator for nested keys, e.g. `ACP_SETTLEMENT__RPC_URL`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("ACP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}
