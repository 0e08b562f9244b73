use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix for environment overrides, e.g. `PROVISIO__WEBHOOK_SECRET`.
pub const ENV_PREFIX: &str = "PROVISIO";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: [&str; 5] = [
    "policy.reserved_domains",
    "policy.blocked_hosts",
    "proxy.test_command",
    "proxy.reload_command",
    "certificates.acme_command",
];

/// Load configuration from an optional file layered under `PROVISIO__*` environment variables.
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ServerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    };

    let path_str = config_path
        .to_str()
        .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?;

    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }

    let settings = Config::builder()
        .add_source(File::new(path_str, format).required(false))
        .add_source(environment)
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(server_config)
}
