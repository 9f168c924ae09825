//! Gateway configuration loader.
//!
//! Reads `tenantgate.toml` from the config directory (`~/.tenantgate/` in
//! production) and deserializes it into [`GatewayConfig`]. Environment
//! overrides are applied on top of the file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tenantgate_types::config::GatewayConfig;
use tenantgate_types::error::ConfigError;

/// File name looked up inside the config directory.
pub const CONFIG_FILE: &str = "tenantgate.toml";

/// Overrides the config directory.
pub const ENV_CONFIG_DIR: &str = "TENANTGATE_CONFIG_DIR";

/// Overrides `master_key`.
pub const ENV_MASTER_KEY: &str = "TENANTGATE_MASTER_KEY";

/// Load configuration from `{config_dir}/tenantgate.toml`, never failing.
///
/// - If the file does not exist, returns [`GatewayConfig::default()`].
/// - If the file cannot be read, parsed or validated, logs a warning and
///   returns the default.
///
/// Environment overrides are applied in every case.
pub async fn load_gateway_config(config_dir: &Path) -> GatewayConfig {
    let config = match load_gateway_config_strict(config_dir).await {
        Ok(config) => return config,
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            GatewayConfig::default()
        }
    };
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Load and validate configuration, reporting any problem as an error.
///
/// A missing file is not an error: defaults are returned.
pub async fn load_gateway_config_strict(config_dir: &Path) -> Result<GatewayConfig, ConfigError> {
    let config_path = config_dir.join(CONFIG_FILE);

    let config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => parse_gateway_config(&content, &config_path)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", config_path.display());
            GatewayConfig::default()
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: config_path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

fn parse_gateway_config(content: &str, path: &Path) -> Result<GatewayConfig, ConfigError> {
    toml::from_str::<GatewayConfig>(content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    mut config: GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> GatewayConfig {
    if let Some(key) = lookup(ENV_MASTER_KEY) {
        config.master_key = Some(key);
    }
    config
}

/// Check cross-field constraints serde cannot express.
pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.start_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "start_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if config.webhook.backoff_base_ms > config.webhook.backoff_max_ms {
        return Err(ConfigError::Invalid(
            "webhook.backoff_base_ms must not exceed webhook.backoff_max_ms".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (index, session) in config.sessions.iter().enumerate() {
        if session.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "sessions[{index}].token must not be empty"
            )));
        }
        if !seen.insert(session.token.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "sessions[{index}].token is provisioned more than once"
            )));
        }
        for target in &session.webhooks {
            if !(target.url.starts_with("http://") || target.url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "sessions[{index}] webhook url must be http(s): {}",
                    target.url
                )));
            }
        }
    }
    Ok(())
}

/// Resolve the config directory.
///
/// Priority:
/// 1. `TENANTGATE_CONFIG_DIR`
/// 2. `~/.tenantgate`
/// 3. `.tenantgate` in the current directory
pub fn resolve_config_dir() -> PathBuf {
    resolve_config_dir_with(|key| std::env::var(key).ok())
}

pub fn resolve_config_dir_with(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup(ENV_CONFIG_DIR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".tenantgate");
    }

    PathBuf::from(".tenantgate")
}
