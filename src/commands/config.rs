// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Manage the configuration file

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::{self, Config, CONFIG_KEYS};

/// Run the config command
pub fn run(
    action: &str,
    key: Option<&str>,
    value: Option<&str>,
    config_path: Option<&Path>,
) -> Result<()> {
    match action {
        "init" => init(config_path),
        "set" => set(key, value, config_path),
        "get" => get(key, config_path),
        "show" => show(config_path),
        "path" => {
            println!("{}", config::config_path(config_path).display());
            Ok(())
        }
        _ => bail!("Unknown action: {}. Use init, set, get, show, or path", action),
    }
}

/// Create a fresh config file with empty values
fn init(config_path: Option<&Path>) -> Result<()> {
    let path = config::config_path(config_path);
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    let saved = config::save(&Config::default(), config_path)?;
    println!("Created config file: {}", saved.display());
    println!();
    println!("Set server URLs and tokens with 'tickwheel config set <key> <value>'.");
    println!("Valid keys: {}", CONFIG_KEYS.join(", "));
    Ok(())
}

fn set(key: Option<&str>, value: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let key = key.ok_or_else(|| anyhow::anyhow!("Usage: tickwheel config set <key> <value>"))?;
    let value =
        value.ok_or_else(|| anyhow::anyhow!("Usage: tickwheel config set <key> <value>"))?;
    let path = config::config_path(config_path);
    let mut cfg = if path.exists() {
        config::load(config_path)?
    } else {
        Config::default()
    };
    cfg.set(key, value)?;
    let saved = config::save(&cfg, config_path)?;
    println!("Set {} in {}", key, saved.display());
    Ok(())
}

fn get(key: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let key = key.ok_or_else(|| anyhow::anyhow!("Usage: tickwheel config get <key>"))?;
    if !CONFIG_KEYS.contains(&key) {
        bail!("Unknown config key: {}. Valid: {}", key, CONFIG_KEYS.join(", "));
    }
    let cfg = config::load(config_path)?;
    match cfg.get(key) {
        Some(value) => println!("{value}"),
        None => bail!("{} is not set", key),
    }
    Ok(())
}

fn show(config_path: Option<&Path>) -> Result<()> {
    let cfg = config::load(config_path)?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}
