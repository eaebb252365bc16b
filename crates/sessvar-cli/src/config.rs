//! Configuration file loading.
//!
//! The file is optional. When given it must exist and parse; every key
//! inside it is optional and falls back to [`StoreConfig::default`].
//!
//! ```toml
//! [store]
//! schema_version = "0.1"
//! busy_timeout_ms = 5000
//! wal = true
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sessvar_store::StoreConfig;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    store: StoreConfig,
}

/// Load the store configuration from `path`, or defaults when `None`.
/// `schema_version` overrides whatever the file says.
pub fn load_store_config(path: Option<&Path>, schema_version: Option<&str>) -> Result<StoreConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            parse(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        }
        None => StoreConfig::default(),
    };

    if let Some(version) = schema_version {
        config = config.with_schema_version(version);
    }

    debug!(
        schema_version = %config.schema_version,
        busy_timeout_ms = config.busy_timeout_ms,
        wal = config.wal,
        "store configuration resolved"
    );
    Ok(config)
}

fn parse(content: &str) -> Result<StoreConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    Ok(file.store)
}
