// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Analyze development time spans of open epics

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config;
use crate::jira::JiraClient;

#[derive(Serialize)]
struct EpicSpan {
    epic_key: String,
    summary: String,
    created: String,
    prior_tickets: usize,
    relevant_tickets: usize,
    development_span_seconds: i64,
    activity_span_seconds: i64,
}

#[derive(Serialize, Default)]
struct SpanReport {
    epics: Vec<EpicSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shortest_epic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longest_epic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_development_span_seconds: Option<i64>,
}

/// Run the span command
pub fn run(
    project: Option<&str>,
    team: Option<&str>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let mut parts = vec![
        "issueType = Epic".to_string(),
        "statusCategory != \"Done\"".to_string(),
    ];
    if let Some(project) = project {
        parts.push(format!("project = \"{project}\""));
    }
    if let Some(team) = team {
        parts.push(format!("\"Sprint Team\" = \"{team}\""));
    }
    let jql = format!("{} ORDER BY created ASC", parts.join(" AND "));

    if !json {
        println!("Searching for open epics...");
        println!("  JQL Query: {jql}");
    }

    let epics = client
        .search(&jql, &["summary", "created"])
        .context("Failed to search for open epics")?;
    if epics.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&SpanReport::default())?);
        } else {
            println!("No open epics found for the specified criteria.");
        }
        return Ok(());
    }
    if !json {
        println!("Found {} open epics.", epics.len());
    }

    let mut ranked: Vec<EpicSpan> = Vec::new();
    for epic in &epics {
        let summary = epic.fields.summary.clone().unwrap_or_default();
        let Some(epic_created) = epic.fields.created_at() else {
            eprintln!(
                "Warning: Epic {} has no parseable created date. Skipping.",
                epic.key
            );
            continue;
        };
        if !json {
            println!();
            println!(
                "  Analyzing Epic: {} - {} (Created: {})",
                epic.key,
                summary,
                epic_created.format("%Y-%m-%d %H:%M:%S")
            );
        }

        let children = client
            .search(
                &format!("\"Epic Link\" = \"{0}\" OR parent = \"{0}\"", epic.key),
                &["created"],
            )
            .with_context(|| format!("Failed to search for children of {}", epic.key))?;
        if children.is_empty() {
            if !json {
                println!("    No child tickets found for Epic {}.", epic.key);
            }
            continue;
        }

        let mut prior: Vec<DateTime<Utc>> = Vec::new();
        let mut relevant: Vec<DateTime<Utc>> = Vec::new();
        for child in &children {
            let Some(created) = child.fields.created_at() else {
                tracing::debug!("Child of {} has no parseable created date", epic.key);
                continue;
            };
            if created < epic_created {
                prior.push(created);
            } else {
                relevant.push(created);
            }
        }
        prior.sort_unstable();
        relevant.sort_unstable();

        if !json {
            let mut line = format!(
                "    Number of Prior Tickets (Created Before Epic): {}",
                prior.len()
            );
            if let (Some(first), Some(last)) = (prior.first(), prior.last()) {
                line.push_str(&format!(
                    " (Range: {} to {})",
                    first.format("%Y-%m-%d"),
                    last.format("%Y-%m-%d")
                ));
            }
            println!("{line}");
        }

        let (Some(first_relevant), Some(last_relevant)) = (relevant.first(), relevant.last())
        else {
            if !json {
                println!(
                    "    No relevant child tickets (created after epic) found for Epic {}.",
                    epic.key
                );
            }
            continue;
        };
        let development = *last_relevant - epic_created;
        let activity = *last_relevant - *first_relevant;
        if !json {
            println!(
                "    Number of Relevant Tickets (Created After Epic): {} (Range: {} to {})",
                relevant.len(),
                first_relevant.format("%Y-%m-%d"),
                last_relevant.format("%Y-%m-%d")
            );
            println!(
                "    Epic Development Span (Epic Creation to Last Relevant Ticket): {}",
                format_span(development)
            );
            println!(
                "    Ticket Creation Activity Span (First Relevant Ticket to Last Relevant Ticket): {}",
                format_span(activity)
            );
        }
        ranked.push(EpicSpan {
            epic_key: epic.key.clone(),
            summary,
            created: epic_created.format("%Y-%m-%d %H:%M:%S").to_string(),
            prior_tickets: prior.len(),
            relevant_tickets: relevant.len(),
            development_span_seconds: development.num_seconds(),
            activity_span_seconds: activity.num_seconds(),
        });
    }

    ranked.sort_by(|a, b| b.development_span_seconds.cmp(&a.development_span_seconds));
    let average = if ranked.is_empty() {
        None
    } else {
        let total: i64 = ranked.iter().map(|e| e.development_span_seconds).sum();
        Some(total / ranked.len() as i64)
    };

    if json {
        let report = SpanReport {
            shortest_epic: ranked.last().map(|e| e.epic_key.clone()),
            longest_epic: ranked.first().map(|e| e.epic_key.clone()),
            average_development_span_seconds: average,
            epics: ranked,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if ranked.is_empty() {
        return Ok(());
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("      Epic Development Time Analysis Summary");
    println!("{}", "=".repeat(60));
    for entry in &ranked {
        println!();
        println!("Epic Key: {}", entry.epic_key);
        println!("  Summary: {} (Created: {})", entry.summary, entry.created);
        println!(
            "  Number of Prior Tickets (Created Before Epic): {}",
            entry.prior_tickets
        );
        println!(
            "  Number of Relevant Tickets (Created After Epic): {}",
            entry.relevant_tickets
        );
        println!(
            "  Epic Development Span (Epic Creation to Last Relevant Ticket): {}",
            format_span(Duration::seconds(entry.development_span_seconds))
        );
        println!(
            "  Ticket Creation Activity Span (First Relevant Ticket to Last Relevant Ticket): {}",
            format_span(Duration::seconds(entry.activity_span_seconds))
        );
        println!("{}", "-".repeat(50));
    }
    if let (Some(longest), Some(shortest)) = (ranked.first(), ranked.last()) {
        println!();
        println!(
            "Epic with the SHORTEST Development Span: {} ({})",
            shortest.epic_key,
            format_span(Duration::seconds(shortest.development_span_seconds))
        );
        println!(
            "Epic with the GREATEST Development Span: {} ({})",
            longest.epic_key,
            format_span(Duration::seconds(longest.development_span_seconds))
        );
    }
    if let Some(average) = average {
        println!();
        println!("{}", "=".repeat(60));
        println!("      Overall Summary");
        println!("{}", "=".repeat(60));
        println!(
            "Average Epic Development Span: {}",
            format_span(Duration::seconds(average))
        );
    }
    Ok(())
}

/// Render a duration as `N days, H:MM:SS`, dropping the day part when zero
fn format_span(span: Duration) -> String {
    let total = span.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        let plural = if days == 1 { "day" } else { "days" };
        format!("{days} {plural}, {hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}:{seconds:02}")
    }
}
