//! `tgate check`: strict configuration validation.

use std::path::Path;

use serde::Serialize;
use tenantgate_infra::config::{CONFIG_FILE, load_gateway_config_strict};
use tenantgate_types::config::GatewayConfig;

/// What `check` reports about a valid configuration.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigSummary {
    pub path: String,
    pub listen: String,
    pub sessions: usize,
    pub autostart: usize,
    pub webhooks: usize,
    pub master_key: bool,
    pub cache_capacity: usize,
}

impl ConfigSummary {
    pub fn of(config: &GatewayConfig, path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            listen: format!("{}:{}", config.server.host, config.server.port),
            sessions: config.sessions.len(),
            autostart: config.sessions.iter().filter(|s| s.autostart).count(),
            webhooks: config.sessions.iter().map(|s| s.webhooks.len()).sum(),
            master_key: config
                .master_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty()),
            cache_capacity: config.effective_cache_capacity(),
        }
    }
}

pub async fn check(config_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_gateway_config_strict(config_dir).await?;
    let summary = ConfigSummary::of(&config, &config_dir.join(CONFIG_FILE));

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        println!("  Configuration OK: {}", summary.path);
        println!("  listen:         {}", summary.listen);
        println!(
            "  sessions:       {} ({} autostart)",
            summary.sessions, summary.autostart
        );
        println!("  webhooks:       {}", summary.webhooks);
        println!("  cache capacity: {}", summary.cache_capacity);
        println!(
            "  master key:     {}",
            if summary.master_key { "configured" } else { "disabled" }
        );
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgate_types::config::SessionConfig;
    use tenantgate_types::webhook::WebhookTarget;

    #[test]
    fn summary_counts_sessions_and_webhooks() {
        let mut config = GatewayConfig::default();
        config.master_key = Some("  ".to_string());
        config.sessions = vec![
            SessionConfig {
                token: "a".to_string(),
                webhooks: vec![
                    WebhookTarget::new("https://h/1"),
                    WebhookTarget::new("https://h/2"),
                ],
                toggles: Default::default(),
                autostart: true,
            },
            SessionConfig {
                token: "b".to_string(),
                webhooks: Vec::new(),
                toggles: Default::default(),
                autostart: false,
            },
        ];

        let summary = ConfigSummary::of(&config, Path::new("/etc/tg/tenantgate.toml"));
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.autostart, 1);
        assert_eq!(summary.webhooks, 2);
        assert!(!summary.master_key);
        assert_eq!(summary.listen, "127.0.0.1:31000");
    }
}
