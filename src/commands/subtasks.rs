// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Find subtasks owned by someone other than their parent's owner

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config;
use crate::jira::JiraClient;
use crate::types::Issue;

#[derive(Serialize)]
struct Mismatch {
    subtask_key: String,
    subtask_summary: String,
    subtask_status: String,
    subtask_assignee: String,
    parent_key: String,
    parent_summary: String,
    parent_status: String,
    parent_assignee: String,
}

/// Run the subtasks command
pub fn run(
    project: &str,
    assignee: Option<&str>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let mut jql = format!("issuetype in subTaskIssueTypes() AND project = \"{project}\"");
    if let Some(assignee) = assignee {
        jql.push_str(&format!(" AND assignee = \"{assignee}\""));
    }
    if !json {
        println!("Executing JQL: {jql}");
    }

    let subtasks = client
        .search(&jql, &["summary", "status", "assignee", "parent"])
        .context("Failed to search for subtasks")?;
    if !json {
        println!(
            "Found {} subtasks matching the initial criteria.",
            subtasks.len()
        );
    }

    // Parents repeat across subtasks, so fetch each one once.
    let mut parents: BTreeMap<String, Option<Issue>> = BTreeMap::new();
    let mut mismatches: Vec<Mismatch> = Vec::new();
    for subtask in &subtasks {
        let Some(parent_ref) = &subtask.fields.parent else {
            eprintln!(
                "Warning: Subtask {} has no parent issue. Skipping.",
                subtask.key
            );
            continue;
        };
        let parent = parents
            .entry(parent_ref.key.clone())
            .or_insert_with(|| match client.issue(&parent_ref.key) {
                Ok(issue) => Some(issue),
                Err(err) => {
                    eprintln!(
                        "Warning: Could not fetch parent {} for subtask {}: {err:#}",
                        parent_ref.key, subtask.key
                    );
                    None
                }
            });
        let Some(parent) = parent else {
            continue;
        };

        let subtask_assignee = subtask.fields.assignee_name();
        let parent_assignee = parent.fields.assignee_name();
        if subtask_assignee != parent_assignee {
            mismatches.push(Mismatch {
                subtask_key: subtask.key.clone(),
                subtask_summary: subtask.fields.summary.clone().unwrap_or_default(),
                subtask_status: subtask.fields.status_name().to_string(),
                subtask_assignee: subtask_assignee.to_string(),
                parent_key: parent.key.clone(),
                parent_summary: parent.fields.summary.clone().unwrap_or_default(),
                parent_status: parent.fields.status_name().to_string(),
                parent_assignee: parent_assignee.to_string(),
            });
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&mismatches)?);
        return Ok(());
    }

    if mismatches.is_empty() {
        println!();
        println!("No subtasks found with a different parent owner.");
        return Ok(());
    }
    println!();
    println!("{}", "-".repeat(60));
    println!("Mismatched Subtasks Found:");
    println!("{}", "-".repeat(60));
    for m in &mismatches {
        println!(
            "Subtask: {} ({}) - {}",
            m.subtask_key, m.subtask_summary, m.subtask_status
        );
        println!("  Assigned to: {}", m.subtask_assignee);
        println!(
            "  Parent:    {} ({}) - {}",
            m.parent_key, m.parent_summary, m.parent_status
        );
        println!("  Parent owner: {}", m.parent_assignee);
        println!();
    }
    Ok(())
}
