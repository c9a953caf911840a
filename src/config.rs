// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config keys accepted by `config set` / `config get`
pub const CONFIG_KEYS: [&str; 7] = [
    "jira_server",
    "personal_access_token",
    "backstage_server",
    "backstage_token",
    "datadog_api_key",
    "datadog_app_key",
    "datadog_site",
];

/// Service endpoints and credentials shared by all workflows.
///
/// Every field is optional in the file; each command checks for the
/// pieces it needs when it builds its client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Jira base URL, e.g. `https://jira.example.com`
    pub jira_server: Option<String>,
    /// Jira personal access token, sent as a bearer token
    pub personal_access_token: Option<String>,
    /// Backstage base URL
    pub backstage_server: Option<String>,
    /// Backstage bearer token
    pub backstage_token: Option<String>,
    /// Datadog API key
    pub datadog_api_key: Option<String>,
    /// Datadog application key
    pub datadog_app_key: Option<String>,
    /// Datadog site (`datadoghq.com`) or a full base URL
    pub datadog_site: Option<String>,
}

impl Config {
    /// Override credentials from the environment
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TICKWHEEL_JIRA_TOKEN") {
            self.personal_access_token = Some(token);
        }
        if let Ok(token) = std::env::var("TICKWHEEL_BACKSTAGE_TOKEN") {
            self.backstage_token = Some(token);
        }
        if let Ok(key) = std::env::var("DD_API_KEY") {
            self.datadog_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("DD_APP_KEY") {
            self.datadog_app_key = Some(key);
        }
    }

    /// Datadog API base URL derived from the configured site.
    ///
    /// A bare site like `datadoghq.eu` becomes `https://api.datadoghq.eu`;
    /// a value with a scheme is used as-is.
    #[must_use]
    pub fn datadog_base_url(&self) -> Option<String> {
        let site = self.datadog_site.as_deref()?;
        if site.contains("://") {
            Some(site.trim_end_matches('/').to_string())
        } else {
            Some(format!("https://api.{}", site))
        }
    }

    /// Read a config value by key name
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "jira_server" => self.jira_server.as_deref(),
            "personal_access_token" => self.personal_access_token.as_deref(),
            "backstage_server" => self.backstage_server.as_deref(),
            "backstage_token" => self.backstage_token.as_deref(),
            "datadog_api_key" => self.datadog_api_key.as_deref(),
            "datadog_app_key" => self.datadog_app_key.as_deref(),
            "datadog_site" => self.datadog_site.as_deref(),
            _ => None,
        }
    }

    /// Set a config value by key name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            "jira_server" => &mut self.jira_server,
            "personal_access_token" => &mut self.personal_access_token,
            "backstage_server" => &mut self.backstage_server,
            "backstage_token" => &mut self.backstage_token,
            "datadog_api_key" => &mut self.datadog_api_key,
            "datadog_app_key" => &mut self.datadog_app_key,
            "datadog_site" => &mut self.datadog_site,
            other => anyhow::bail!(
                "Unknown config key: {}. Valid: {}",
                other,
                CONFIG_KEYS.join(", ")
            ),
        };
        *slot = Some(value.to_string());
        Ok(())
    }
}

/// Resolve the config file path: the explicit flag/env value when given,
/// otherwise the user config directory, falling back to `./.tickwheel`
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    directories::ProjectDirs::from("org", "tickwheel", "tickwheel")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .unwrap_or_else(|| PathBuf::from(".tickwheel").join("config.json"))
}

/// Load configuration from disk, then apply env overrides
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = config_path(explicit);
    let content = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "No config file at {}. Run 'tickwheel config init' to create one, \
             then fill in the server URLs and tokens.",
            path.display()
        )
    })?;
    let mut config: Config =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

/// Write configuration to disk, creating parent directories
pub fn save(config: &Config, explicit: Option<&Path>) -> Result<PathBuf> {
    let path = config_path(explicit);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
