// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Populate remaining estimates from original estimates

use std::path::Path;
use std::thread;

use anyhow::{bail, Context, Result};
use owo_colors::{OwoColorize, Style};

use crate::config;
use crate::jira::{JiraClient, WRITE_PACING};
use crate::types::STORY_POINTS_FIELD;

/// Statuses that mark work as finished for estimate purposes
const EXCLUDED_STATUSES: &str = "\"Acceptance\", \"Approved to Deploy\", Certified, Closed, \
     Complete, Completed, Deployed, Done, \"Ready for Deployment\", \"Ready For Release\", \
     \"Ready to Deploy\", \"Ready to Release\", Released, Resolved, Withdrawn";

/// Run the estimate command
pub fn run(
    scope: &str,
    name: &str,
    apply: bool,
    config_path: Option<&Path>,
    color: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let scope_clause = match scope {
        "assignee" => format!("Assignee = \"{name}\""),
        "team" => format!("\"Sprint Team\" = \"{name}\""),
        other => bail!("Invalid query type: {}. Must be 'assignee' or 'team'", other),
    };
    let jql = format!(
        "{scope_clause} AND \"Story Points\" > 0 AND originalEstimate > 0 \
         AND remainingEstimate = 0 \
         AND issuetype not in (subTaskIssueTypes(), \"Test Case Execution\", \
         \"Test Execution\", Test, DBCR) \
         AND status NOT IN ({EXCLUDED_STATUSES}) ORDER BY key ASC"
    );

    let bold = Style::new().bold();
    println!("{}", paint("Using JQL query:", bold, color));
    println!("{}", paint(&jql, Style::new().cyan(), color));
    println!();

    let issues = client
        .search(&jql, &["summary", STORY_POINTS_FIELD, "timetracking"])
        .context("Failed to search for issues")?;
    println!(
        "{}",
        paint(
            &format!("Found {} issues matching the query.", issues.len()),
            bold,
            color
        )
    );
    if issues.is_empty() {
        println!(
            "{}",
            paint("No issues found matching the query.", Style::new().yellow(), color)
        );
        return Ok(());
    }

    let mut updated = 0;
    let mut skipped = 0;
    for issue in &issues {
        let summary = issue.fields.summary.as_deref().unwrap_or_default();
        let story_points = issue.fields.story_points();
        let original_estimate = issue
            .fields
            .timetracking
            .as_ref()
            .and_then(|t| t.original_estimate.as_deref());

        let (Some(_points), Some(estimate)) = (story_points, original_estimate) else {
            let reason = if story_points.is_none() {
                "no story points"
            } else {
                "no original estimate"
            };
            println!(
                "{}: {}",
                paint(&issue.key, Style::new().yellow(), color),
                summary
            );
            println!("  Skipped - {reason}");
            skipped += 1;
            continue;
        };

        if apply {
            let result = client.set_remaining_estimate(&issue.key, estimate);
            thread::sleep(WRITE_PACING);
            match result {
                Ok(()) => {
                    println!(
                        "{}: {}",
                        paint(&issue.key, Style::new().green(), color),
                        summary
                    );
                    println!(
                        "  ✓ Set remaining estimate to: {} (completed ticket)",
                        paint(estimate, Style::new().green(), color)
                    );
                    updated += 1;
                }
                Err(err) => {
                    println!(
                        "{}",
                        paint(
                            &format!("{}: Error updating issue - {err:#}", issue.key),
                            Style::new().red(),
                            color
                        )
                    );
                    skipped += 1;
                }
            }
        } else {
            println!(
                "{}: {}",
                paint(&issue.key, Style::new().cyan(), color),
                summary
            );
            println!("  Would set remaining estimate to: {estimate} (completed ticket)");
            updated += 1;
        }
    }

    println!();
    println!("{}", paint("Summary:", bold, color));
    if apply {
        println!("  Updated: {updated} issues");
        println!("  Skipped: {skipped} issues");
    } else {
        println!("  Would update: {updated} issues");
        println!("  Would skip: {skipped} issues");
        println!();
        println!(
            "{}",
            paint("Run with --apply to apply changes.", Style::new().cyan(), color)
        );
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
