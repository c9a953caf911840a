// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Create scorecard improvement tickets from a team manifest

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Style};

use crate::backstage::BackstageClient;
use crate::compliance::{self, Category, CategoryReport};
use crate::config;
use crate::jira::{JiraClient, WRITE_PACING};
use crate::types::{TeamTicket, TicketManifest, EPIC_LINK_FIELD};

/// Arguments for ticket creation
pub struct CreateArgs {
    /// Only process these manifest teams
    pub teams: Vec<String>,
    /// Process every manifest team except these
    pub exclude_teams: Vec<String>,
    /// Create tickets instead of simulating
    pub apply: bool,
    /// Skip the interactive confirmation
    pub yes: bool,
}

struct CreatedTicket {
    id: String,
    summary: String,
}

/// Run the create command
pub fn run(
    manifest_path: &Path,
    args: &CreateArgs,
    config_path: Option<&Path>,
    color: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;

    let raw = fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let manifest: TicketManifest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", manifest_path.display()))?;
    let TicketManifest {
        priority,
        mut teams,
    } = manifest;

    println!(
        "{}",
        paint(
            "Using default issue type: Task (teams can override with 'issue_type')",
            Style::new().cyan(),
            color
        )
    );
    match &priority {
        Some(priority) => println!("Using priority from manifest: {priority}"),
        None => println!("No priority specified in manifest, using Jira default"),
    }

    let requested = split_names(&args.teams);
    let excluded = split_names(&args.exclude_teams);
    let mut filter_info = "";
    if !requested.is_empty() {
        println!(
            "Team filter active: Will only process these teams: {}",
            requested.join(", ")
        );
        warn_missing(&requested, &teams, "specified", color);
        teams.retain(|name, _| {
            requested.iter().any(|wanted| name.eq_ignore_ascii_case(wanted))
        });
        filter_info = " (filtered to include only specified teams)";
    } else if !excluded.is_empty() {
        println!(
            "Team filter active: Will exclude these teams: {}",
            excluded.join(", ")
        );
        warn_missing(&excluded, &teams, "excluded", color);
        teams.retain(|name, _| {
            !excluded.iter().any(|unwanted| name.eq_ignore_ascii_case(unwanted))
        });
        filter_info = " (with excluded teams filtered out)";
    }

    println!(
        "Will query Backstage for {} teams across {} categories",
        teams.len(),
        Category::ALL.len()
    );
    if args.apply {
        println!(
            "{}",
            paint(
                "Running in CREATE mode - tickets will be created in Jira as default \
                 issue type 'Task' (unless team-specific)",
                Style::new().yellow(),
                color
            )
        );
    } else {
        println!(
            "{}",
            paint(
                "Running in DRY-RUN mode - tickets would be created as default \
                 issue type 'Task' (unless team-specific)",
                Style::new().cyan(),
                color
            )
        );
    }

    if args.apply && !args.yes && !confirm()? {
        println!("Operation cancelled by user.");
        return Ok(());
    }

    let backstage = BackstageClient::from_config(&cfg)?;
    let jira = if args.apply {
        Some(JiraClient::from_config(&cfg)?)
    } else {
        None
    };

    let mut created: Vec<CreatedTicket> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    let mut sim_counters: BTreeMap<String, u64> = BTreeMap::new();
    for (team, ticket) in &teams {
        println!();
        println!("Processing team: {team}");
        let results = match backstage.soundcheck_results(&format!("group:default/{team}")) {
            Ok(results) => results,
            Err(err) => {
                eprintln!("Warning: Could not fetch Soundcheck results for {team}: {err:#}");
                continue;
            }
        };
        for report in compliance::analyze(&results.results) {
            if !report.improvement_needed() {
                println!(
                    "    {}: At maximum compliance level - no improvement needed",
                    report.category
                );
                continue;
            }
            println!(
                "    {}: Currently at {}, improvement opportunities available",
                report.category, report.current_level
            );

            let summary = format!("{team} Scorecards Improvement: {}", report.category);
            let description = build_description(&report);
            let Some(project) = ticket.project.as_deref() else {
                println!(
                    "{}",
                    paint(
                        &format!("Skipping {team} - no Project specified"),
                        Style::new().yellow(),
                        color
                    )
                );
                skipped.push(format!("{team}_{}", report.category));
                continue;
            };
            let issue_type = ticket.issue_type.as_deref().unwrap_or("Task");

            match &jira {
                None => {
                    let counter = sim_counters.entry(project.to_string()).or_default();
                    *counter += 1;
                    let id = format!("simulated-{project}-{counter}");
                    println!(
                        "{}",
                        paint(
                            &format!(
                                "[DRY RUN] Would create ticket: '{summary}' for key \
                                 '{team}' in project {project} as issue type '{issue_type}'"
                            ),
                            Style::new().yellow(),
                            color
                        )
                    );
                    println!("  Description: {description}");
                    if let Some(epic) = &ticket.epic_link {
                        println!("  Would link to parent epic: {epic}");
                    }
                    created.push(CreatedTicket { id, summary });
                }
                Some(client) => {
                    let fields = issue_fields(
                        project,
                        issue_type,
                        &summary,
                        &description,
                        ticket,
                        priority.as_deref(),
                    );
                    match client.create_issue(fields) {
                        Ok(key) => {
                            println!(
                                "{}",
                                paint(
                                    &format!(
                                        "Created ticket: '{key} - {summary}' for key \
                                         '{team}' in project {project} as issue type \
                                         '{issue_type}'"
                                    ),
                                    Style::new().green(),
                                    color
                                )
                            );
                            set_assignee(client, &key, ticket, color);
                            if let Some(epic) = &ticket.epic_link {
                                if let Err(err) = link_to_epic(client, &key, epic) {
                                    println!(
                                        "{}",
                                        paint(
                                            &format!(
                                                "Warning: Could not link ticket {key} \
                                                 to epic {epic}: {err:#}"
                                            ),
                                            Style::new().yellow(),
                                            color
                                        )
                                    );
                                }
                            }
                            created.push(CreatedTicket { id: key, summary });
                        }
                        Err(err) => {
                            println!(
                                "{}",
                                paint(
                                    &format!(
                                        "Error processing {team} - {}: {err:#}",
                                        report.category
                                    ),
                                    Style::new().red(),
                                    color
                                )
                            );
                            skipped.push(format!("{team}_{}", report.category));
                        }
                    }
                    thread::sleep(WRITE_PACING);
                }
            }
        }
    }

    print_overall_summary(&created, &skipped, args.apply, filter_info, color);
    Ok(())
}

/// Split repeatable flag values on commas and trim them
fn split_names(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn warn_missing(names: &[String], teams: &BTreeMap<String, TeamTicket>, label: &str, color: bool) {
    let missing: Vec<&str> = names
        .iter()
        .filter(|name| !teams.keys().any(|key| key.eq_ignore_ascii_case(name)))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        println!(
            "{}",
            paint(
                &format!(
                    "Warning: Some {label} teams not found in manifest: {}",
                    missing.join(", ")
                ),
                Style::new().yellow(),
                color
            )
        );
    }
}

/// Ask for confirmation on stdin, accepting only `y`
fn confirm() -> Result<bool> {
    print!(
        "\nWARNING: This will create actual tickets in Jira using Backstage data \
         for {} categories. Continue? (y/n): ",
        Category::ALL.len()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Jira markup description for one category's improvement opportunities
fn build_description(report: &CategoryReport) -> String {
    let mut text = format!(
        "*Backstage Scorecards Category:* {}\n\n*Current Compliance Level:* {}\n\n\
         *Improvement Opportunities:* ({} total)\n\n",
        report.category,
        report.current_level,
        report.improvements.len()
    );
    for (level, improvements) in report.improvements_by_level() {
        text.push_str(&format!("**{level} Issues:**\n"));
        for improvement in improvements {
            text.push_str(&format!("  \u{2022} **{}**:\n", improvement.name));
            text.push_str(&format!("    - Check: `{}`\n", improvement.check_id));
            text.push_str(&format!(
                "    - Status: {}\n",
                improvement.state.to_uppercase()
            ));
            text.push_str(&format!(
                "    - Current: {}/{} components ({:.0}%)\n",
                improvement.current, improvement.total, improvement.percentage
            ));
            if let Some(range) = improvement.target_range() {
                text.push_str(&format!("    - Target: {range}\n"));
            }
            let needed = improvement.needed();
            if needed > 0 {
                let plural = if needed == 1 { "" } else { "s" };
                text.push_str(&format!(
                    "    - **Action Required**: Fix {needed} additional component{plural}\n"
                ));
            }
            text.push('\n');
        }
        text.push('\n');
    }
    text
}

fn issue_fields(
    project: &str,
    issue_type: &str,
    summary: &str,
    description: &str,
    ticket: &TeamTicket,
    priority: Option<&str>,
) -> serde_json::Value {
    let mut fields = serde_json::json!({
        "project": {"key": project},
        "summary": summary,
        "description": description,
        "issuetype": {"name": issue_type},
    });
    if !ticket.labels.is_empty() {
        fields["labels"] = serde_json::json!(ticket.labels);
    }
    if let Some(priority) = priority {
        fields["priority"] = serde_json::json!({ "name": priority });
    }
    fields
}

fn set_assignee(client: &JiraClient, key: &str, ticket: &TeamTicket, color: bool) {
    let Some(assignee) = ticket.assignee.as_deref() else {
        return;
    };
    println!(
        "{}",
        paint(
            &format!("Setting assignee for {key} to '{assignee}' with separate API request"),
            Style::new().cyan(),
            color
        )
    );
    match client.assign_issue(key, assignee) {
        Ok(()) => println!(
            "{}",
            paint(
                &format!("Successfully set assignee for {key} to '{assignee}'"),
                Style::new().green(),
                color
            )
        ),
        Err(err) => println!(
            "{}",
            paint(
                &format!("Warning: Could not set assignee for ticket {key}: {err:#}"),
                Style::new().yellow(),
                color
            )
        ),
    }
}

/// Link a ticket to its epic, falling back through link types when the
/// epic link field is rejected
fn link_to_epic(client: &JiraClient, issue_key: &str, epic_key: &str) -> Result<()> {
    client
        .update_fields(issue_key, serde_json::json!({ EPIC_LINK_FIELD: epic_key }))
        .or_else(|_| client.link_issues("Epic-Story Link", epic_key, issue_key))
        .or_else(|_| client.link_issues("Relates to", epic_key, issue_key))
}

fn print_overall_summary(
    created: &[CreatedTicket],
    skipped: &[String],
    apply: bool,
    filter_info: &str,
    color: bool,
) {
    println!();
    println!(
        "{}",
        paint("=== OVERALL SUMMARY ===", Style::new().cyan(), color)
    );
    let mut ordered: Vec<&CreatedTicket> = created.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    if apply {
        if ordered.is_empty() {
            println!(
                "{}",
                paint(
                    &format!("No tickets were created{filter_info}."),
                    Style::new().yellow(),
                    color
                )
            );
        } else {
            println!(
                "{}",
                paint(
                    &format!(
                        "Created a total of {} tickets as issue type 'Task'{filter_info}.",
                        ordered.len()
                    ),
                    Style::new().green(),
                    color
                )
            );
            println!();
            println!(
                "{}",
                paint("=== CREATED TICKETS (Alphabetical) ===", Style::new().cyan(), color)
            );
            for (index, ticket) in ordered.iter().enumerate() {
                println!(
                    "{}",
                    paint(
                        &format!("{}. {}: {}", index + 1, ticket.id, ticket.summary),
                        Style::new().blue(),
                        color
                    )
                );
            }
            if let Some(first) = ordered.first() {
                println!();
                println!(
                    "{}",
                    paint(
                        &format!("Tip: Inspect a created ticket with 'tickwheel fields {}'", first.id),
                        Style::new().cyan(),
                        color
                    )
                );
            }
        }
    } else {
        println!(
            "{}",
            paint(
                &format!(
                    "[DRY RUN] Would have created a total of {} tickets in Jira as \
                     issue type 'Task'{filter_info}.",
                    ordered.len()
                ),
                Style::new().yellow(),
                color
            )
        );
        if !ordered.is_empty() {
            println!();
            println!(
                "{}",
                paint("=== SIMULATED TICKETS (Alphabetical) ===", Style::new().cyan(), color)
            );
            for (index, ticket) in ordered.iter().enumerate() {
                println!(
                    "{}",
                    paint(
                        &format!("{}. {}: {}", index + 1, ticket.id, ticket.summary),
                        Style::new().blue(),
                        color
                    )
                );
            }
            println!();
            println!("Simulated tickets for copy-paste:");
            let ids: Vec<&str> = ordered.iter().map(|t| t.id.as_str()).collect();
            println!("{}", ids.join(", "));
        }
    }
    if !skipped.is_empty() {
        println!(
            "{}",
            paint(
                &format!("Skipped a total of {} tickets due to errors.", skipped.len()),
                Style::new().red(),
                color
            )
        );
        println!();
        println!(
            "{}",
            paint("=== SKIPPED TICKETS (Alphabetical) ===", Style::new().cyan(), color)
        );
        let mut ordered_skips: Vec<&str> = skipped.iter().map(String::as_str).collect();
        ordered_skips.sort_unstable();
        for (index, entry) in ordered_skips.iter().enumerate() {
            println!("{}. {entry}", index + 1);
        }
    }
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{Improvement, Level};

    #[test]
    fn test_split_names_handles_commas_and_whitespace() {
        let values = vec!["alpha, beta".to_string(), "gamma".to_string(), " ".to_string()];
        assert_eq!(split_names(&values), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_build_description_mentions_every_failing_check() {
        let report = CategoryReport {
            category: Category::Quality,
            current_level: Level::L1,
            max_level: Level::L4,
            improvements: vec![Improvement {
                check_id: "sonarCoverageCheckComponent70.rollups".to_string(),
                name: "SonarQube Code Coverage (70%)".to_string(),
                level: Level::L3,
                state: "failed".to_string(),
                current: 3,
                total: 10,
                percentage: 30.0,
                target: None,
            }],
        };
        let text = build_description(&report);
        assert!(text.contains("*Backstage Scorecards Category:* Quality"));
        assert!(text.contains("*Current Compliance Level:* L1"));
        assert!(text.contains("**L3 Issues:**"));
        assert!(text.contains("`sonarCoverageCheckComponent70.rollups`"));
        assert!(text.contains("Status: FAILED"));
        assert!(text.contains("Current: 3/10 components (30%)"));
        assert!(text.contains("**Action Required**: Fix 7 additional components"));
    }

    #[test]
    fn test_issue_fields_includes_optional_parts() {
        let ticket = TeamTicket {
            project: Some("PLAT".to_string()),
            issue_type: None,
            epic_link: None,
            assignee: None,
            labels: vec!["scorecards".to_string()],
        };
        let fields = issue_fields("PLAT", "Task", "Summary", "Description", &ticket, Some("High"));
        assert_eq!(fields["project"]["key"], "PLAT");
        assert_eq!(fields["issuetype"]["name"], "Task");
        assert_eq!(fields["labels"][0], "scorecards");
        assert_eq!(fields["priority"]["name"], "High");

        let bare = TeamTicket {
            project: Some("PLAT".to_string()),
            issue_type: None,
            epic_link: None,
            assignee: None,
            labels: Vec::new(),
        };
        let fields = issue_fields("PLAT", "Task", "Summary", "Description", &bare, None);
        assert!(fields.get("labels").is_none());
        assert!(fields.get("priority").is_none());
    }
}
