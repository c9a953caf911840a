// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! List custom fields carrying values on an issue

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::config;
use crate::jira::JiraClient;

#[derive(Serialize)]
struct FieldValue {
    id: String,
    name: String,
    value: serde_json::Value,
}

/// Run the fields command
pub fn run(issue_key: &str, config_path: Option<&Path>, json: bool, color: bool) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let issue = client
        .issue(issue_key)
        .with_context(|| format!("Failed to fetch issue {issue_key}"))?;
    let catalog = client
        .field_catalog()
        .context("Failed to fetch the field catalog")?;
    let custom_names: BTreeMap<&str, &str> = catalog
        .iter()
        .filter(|field| field.custom)
        .map(|field| (field.id.as_str(), field.name.as_str()))
        .collect();

    let populated: BTreeMap<&String, &serde_json::Value> = issue
        .fields
        .extra
        .iter()
        .filter(|(id, value)| custom_names.contains_key(id.as_str()) && !value.is_null())
        .collect();

    if json {
        let report: Vec<FieldValue> = populated
            .iter()
            .map(|(id, value)| FieldValue {
                id: (*id).clone(),
                name: custom_names[id.as_str()].to_string(),
                value: (*value).clone(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    println!(
        "{}",
        paint(&format!("Examining issue: {}", issue.key), bold, color)
    );
    println!(
        "Summary: {}",
        issue.fields.summary.as_deref().unwrap_or_default()
    );
    println!();
    println!(
        "{}",
        paint("Custom fields with values in this issue:", bold, color)
    );
    println!("{}", "-".repeat(60));
    if populated.is_empty() {
        println!("No custom fields with values found.");
        return Ok(());
    }
    for (id, value) in &populated {
        println!(
            "{}: {}",
            paint(id, Style::new().cyan(), color),
            custom_names[id.as_str()]
        );
        println!(
            "  Value: {}",
            paint(&value.to_string(), Style::new().green(), color)
        );
        println!();
    }
    Ok(())
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}
