// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Evaluate an epic's plan sprint by sprint

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::config;
use crate::jira::JiraClient;
use crate::types::{
    parse_jira_datetime, sprint_field_elements, status_is_done, SprintFieldEntry, SPRINT_FIELD,
};

/// Tickets grouped by status within one sprint
type StatusBuckets = BTreeMap<String, Vec<(String, String)>>;

/// Name and dates for one sprint, as fetched from the Agile API
struct SprintInfo {
    name: String,
    start_raw: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

/// Run the status command
pub fn run(epic_key: &str, config_path: Option<&Path>, json: bool, color: bool) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let epic = client
        .issue(epic_key)
        .with_context(|| format!("Failed to fetch epic {epic_key}"))?;

    let children = client
        .search(
            &format!("\"Epic Link\" = {epic_key}"),
            &["summary", "status", SPRINT_FIELD],
        )
        .context("Failed to search for epic children")?;

    let mut planned: BTreeMap<u64, StatusBuckets> = BTreeMap::new();
    let mut completed: BTreeMap<u64, StatusBuckets> = BTreeMap::new();
    let mut unplanned_finished: Vec<(String, String, String)> = Vec::new();
    let mut unplanned: Vec<(String, String, String)> = Vec::new();

    for issue in &children {
        let status = issue.fields.status_name().to_string();
        let summary = issue.fields.summary.clone().unwrap_or_default();
        match last_sprint_id(&issue.key, issue.fields.sprint_field()) {
            Some(sprint_id) => {
                let bucket = if issue.fields.is_done() {
                    &mut completed
                } else {
                    &mut planned
                };
                bucket
                    .entry(sprint_id)
                    .or_default()
                    .entry(status)
                    .or_default()
                    .push((issue.key.clone(), summary));
            }
            None if issue.fields.is_done() || status.eq_ignore_ascii_case("withdrawn") => {
                unplanned_finished.push((issue.key.clone(), summary, status));
            }
            None => unplanned.push((issue.key.clone(), summary, status)),
        }
    }

    let sprint_ids: BTreeSet<u64> = planned.keys().chain(completed.keys()).copied().collect();
    let mut sprints: BTreeMap<u64, SprintInfo> = BTreeMap::new();
    for id in &sprint_ids {
        sprints.insert(*id, fetch_sprint(&client, *id));
    }

    // Sprints with an unparseable start date sort first, sprints with no
    // start date at all sort last.
    let mut ordered_ids: Vec<u64> = sprint_ids.iter().copied().collect();
    ordered_ids.sort_by_key(|id| {
        let info = &sprints[id];
        let start = match &info.start_raw {
            Some(raw) => parse_jira_datetime(raw).unwrap_or(DateTime::<Utc>::MIN_UTC),
            None => DateTime::<Utc>::MAX_UTC,
        };
        (start, *id)
    });

    if json {
        return print_json(
            &epic.key,
            &unplanned_finished,
            &completed,
            &planned,
            &unplanned,
            &ordered_ids,
            &sprints,
        );
    }

    let bold = Style::new().bold();
    println!(
        "{}",
        paint(&format!("Epic Plan Evaluation: {}", epic.key), bold, color)
    );
    print_simple_section(
        "Completed (Withdrawn or Done no sprint) Work",
        &unplanned_finished,
        color,
    );
    print_sprint_section("Completed Work", &completed, &ordered_ids, &sprints, color);
    print_sprint_section("Planned Work", &planned, &ordered_ids, &sprints, color);
    print_simple_section("Unplanned Work", &unplanned, color);
    Ok(())
}

/// Last valid sprint id in the sprint custom field, warning on bad entries
fn last_sprint_id(issue_key: &str, field: Option<&serde_json::Value>) -> Option<u64> {
    let field = field?;
    let mut sprint_id = None;
    for element in sprint_field_elements(field) {
        let parsed = serde_json::from_value::<SprintFieldEntry>(element.clone())
            .ok()
            .and_then(|entry| entry.id());
        match parsed {
            Some(id) => sprint_id = Some(id),
            None => eprintln!(
                "Warning: Issue {issue_key} has invalid sprint data: {element}"
            ),
        }
    }
    sprint_id
}

fn fetch_sprint(client: &JiraClient, id: u64) -> SprintInfo {
    match client.sprint(id) {
        Ok(sprint) => SprintInfo {
            name: sprint
                .name
                .unwrap_or_else(|| format!("Sprint ID {id} (Unnamed)")),
            start: sprint.start_date.as_deref().and_then(parse_jira_datetime),
            end: sprint.end_date.as_deref().and_then(parse_jira_datetime),
            start_raw: sprint.start_date,
        },
        Err(err) => {
            eprintln!("Error getting sprint data for ID {id}: {err:#}");
            SprintInfo {
                name: format!("Sprint ID {id} (Data Unavailable)"),
                start_raw: None,
                start: None,
                end: None,
            }
        }
    }
}

fn print_simple_section(title: &str, tickets: &[(String, String, String)], color: bool) {
    if tickets.is_empty() {
        return;
    }
    println!();
    println!("{}", paint(&format!("{title}:"), Style::new().bold(), color));
    for (key, summary, status) in tickets {
        println!("  {}: {}", paint(key, status_style(status), color), summary);
    }
}

fn print_sprint_section(
    title: &str,
    groups: &BTreeMap<u64, StatusBuckets>,
    ordered_ids: &[u64],
    sprints: &BTreeMap<u64, SprintInfo>,
    color: bool,
) {
    if groups.is_empty() {
        return;
    }
    let bold = Style::new().bold();
    println!();
    println!("{}", paint(&format!("{title}:"), bold, color));
    for id in ordered_ids {
        let Some(buckets) = groups.get(id) else {
            continue;
        };
        let info = &sprints[id];
        println!();
        println!(
            "{}",
            paint(
                &format!(
                    "Sprint: {} ({} - {})",
                    info.name,
                    format_date(info.start),
                    format_date(info.end)
                ),
                bold,
                color
            )
        );
        for (status, tickets) in buckets {
            println!("  {status}:");
            for (key, summary) in tickets {
                println!("    {}: {}", paint(key, status_style(status), color), summary);
            }
        }
    }
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn status_style(status: &str) -> Style {
    if status_is_done(status) {
        Style::new().green().bold()
    } else if status.eq_ignore_ascii_case("withdrawn") {
        Style::new().green()
    } else {
        Style::new().yellow()
    }
}

#[derive(Serialize)]
struct TicketLine {
    key: String,
    status: String,
    summary: String,
}

#[derive(Serialize)]
struct SprintGroup {
    sprint_id: u64,
    name: String,
    start_date: Option<String>,
    end_date: Option<String>,
    statuses: BTreeMap<String, Vec<TicketLine>>,
}

#[derive(Serialize)]
struct StatusReport {
    epic: String,
    completed_no_sprint: Vec<TicketLine>,
    completed: Vec<SprintGroup>,
    planned: Vec<SprintGroup>,
    unplanned: Vec<TicketLine>,
}

fn print_json(
    epic: &str,
    unplanned_finished: &[(String, String, String)],
    completed: &BTreeMap<u64, StatusBuckets>,
    planned: &BTreeMap<u64, StatusBuckets>,
    unplanned: &[(String, String, String)],
    ordered_ids: &[u64],
    sprints: &BTreeMap<u64, SprintInfo>,
) -> Result<()> {
    let simple = |tickets: &[(String, String, String)]| -> Vec<TicketLine> {
        tickets
            .iter()
            .map(|(key, summary, status)| TicketLine {
                key: key.clone(),
                status: status.clone(),
                summary: summary.clone(),
            })
            .collect()
    };
    let grouped = |groups: &BTreeMap<u64, StatusBuckets>| -> Vec<SprintGroup> {
        ordered_ids
            .iter()
            .filter_map(|id| {
                let buckets = groups.get(id)?;
                let info = &sprints[id];
                Some(SprintGroup {
                    sprint_id: *id,
                    name: info.name.clone(),
                    start_date: info.start.map(|d| d.format("%Y-%m-%d").to_string()),
                    end_date: info.end.map(|d| d.format("%Y-%m-%d").to_string()),
                    statuses: buckets
                        .iter()
                        .map(|(status, tickets)| {
                            let lines = tickets
                                .iter()
                                .map(|(key, summary)| TicketLine {
                                    key: key.clone(),
                                    status: status.clone(),
                                    summary: summary.clone(),
                                })
                                .collect();
                            (status.clone(), lines)
                        })
                        .collect(),
                })
            })
            .collect()
    };
    let report = StatusReport {
        epic: epic.to_string(),
        completed_no_sprint: simple(unplanned_finished),
        completed: grouped(completed),
        planned: grouped(planned),
        unplanned: simple(unplanned),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}
