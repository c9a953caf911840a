// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Attribute Backstage applications to their owning teams

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Style};

use crate::backstage::{application_info, owner_matches, BackstageClient};
use crate::config;
use crate::types::{ApplicationInfo, AttributionReport, Entity, TeamApplications};

/// Run the attribution command
pub fn run(
    team: Option<&str>,
    output: Option<&Path>,
    config_path: Option<&Path>,
    json: bool,
    color: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = BackstageClient::from_config(&cfg)?;

    let output_file = output.map_or_else(
        || {
            PathBuf::from(team.map_or_else(
                || "all_team_applications.json".to_string(),
                |t| format!("{t}_applications.json"),
            ))
        },
        Path::to_path_buf,
    );

    if !json {
        println!("Starting application attribution query...");
        println!(
            "Backstage URL: {}",
            cfg.backstage_server.as_deref().unwrap_or_default()
        );
        if let Some(team) = team {
            println!("Team: {team}");
        }
        println!(
            "Output file: {}",
            paint(&output_file.display().to_string(), Style::new().cyan(), color)
        );
    }

    let components = client
        .components()
        .context("Failed to fetch components from Backstage")?;

    let mut attribution: AttributionReport = BTreeMap::new();
    let total_teams;
    if let Some(team) = team {
        total_teams = 1;
        if !json {
            println!("Querying applications for team: {team}...");
        }
        let groups = client
            .groups()
            .context("Failed to fetch groups from Backstage")?;
        let mut team_apps = groups
            .iter()
            .find(|group| group.metadata.name.eq_ignore_ascii_case(team))
            .map_or_else(
                || TeamApplications {
                    team_name: team.to_string(),
                    team_title: team.to_string(),
                    ..TeamApplications::default()
                },
                |group| client.team_info(group),
            );
        let applications = team_applications(&components, &team_apps.team_name);
        if applications.is_empty() {
            if !json {
                println!(
                    "{}",
                    paint(
                        &format!("No applications found for {team}"),
                        Style::new().yellow(),
                        color
                    )
                );
            }
        } else {
            if !json {
                println!(
                    "{}",
                    paint(
                        &format!("Found {} applications for {team}", applications.len()),
                        Style::new().green(),
                        color
                    )
                );
            }
            finish_team(&mut team_apps, applications);
            attribution.insert(team_apps.team_name.clone(), team_apps);
        }
    } else {
        let groups = client
            .groups()
            .context("Failed to fetch groups from Backstage")?;
        if groups.is_empty() {
            if !json {
                println!(
                    "{}",
                    paint("No teams found in Backstage", Style::new().red(), color)
                );
            }
        } else if !json {
            println!(
                "{}",
                paint(
                    &format!("Found {} teams in Backstage", groups.len()),
                    Style::new().green(),
                    color
                )
            );
            println!("Querying applications for each team...");
        }
        total_teams = groups.len();
        for (index, group) in groups.iter().enumerate() {
            let mut team_apps = client.team_info(group);
            if team_apps.team_name.is_empty() {
                continue;
            }
            if !json {
                println!(
                    "{}",
                    paint(
                        &format!(
                            "  Querying team: {} ({}) ({}/{})",
                            team_apps.team_title,
                            team_apps.team_name,
                            index + 1,
                            total_teams
                        ),
                        Style::new().cyan(),
                        color
                    )
                );
            }
            let applications = team_applications(&components, &team_apps.team_name);
            if applications.is_empty() {
                if !json {
                    println!(
                        "{}",
                        paint("    No applications found", Style::new().yellow(), color)
                    );
                }
                continue;
            }
            if !json {
                println!(
                    "{}",
                    paint(
                        &format!("    Found {} applications", applications.len()),
                        Style::new().green(),
                        color
                    )
                );
            }
            finish_team(&mut team_apps, applications);
            attribution.insert(team_apps.team_name.clone(), team_apps);
        }
    }

    if attribution.is_empty() {
        if json {
            println!("{}", serde_json::to_string_pretty(&attribution)?);
        } else {
            println!(
                "{}",
                paint(
                    "No application attribution data collected",
                    Style::new().red(),
                    color
                )
            );
        }
        return Ok(());
    }

    let serialized = serde_json::to_string_pretty(&attribution)?;
    fs::write(&output_file, &serialized)
        .with_context(|| format!("Failed to write {}", output_file.display()))?;

    if json {
        println!("{serialized}");
        return Ok(());
    }
    println!(
        "{}",
        paint(
            &format!(
                "Successfully saved application attribution to {}",
                output_file.display()
            ),
            Style::new().green(),
            color
        )
    );
    print_summary(&attribution, total_teams, color);
    Ok(())
}

/// Applications in the catalog owned by the given team
fn team_applications(components: &[Entity], team_name: &str) -> Vec<ApplicationInfo> {
    components
        .iter()
        .filter(|component| {
            component
                .spec
                .owner_str()
                .is_some_and(|owner| owner_matches(owner, team_name))
                && component
                    .spec
                    .entity_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("application"))
        })
        .map(application_info)
        .collect()
}

/// Attach applications to a team, inheriting the team product when unset
fn finish_team(team: &mut TeamApplications, mut applications: Vec<ApplicationInfo>) {
    if team.product.is_none() {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for app in &applications {
            if let Some(product) = app.product.as_deref() {
                *counts.entry(product).or_default() += 1;
            }
        }
        let mut best: Option<&str> = None;
        let mut best_count = 0;
        for (product, count) in &counts {
            if *count > best_count {
                best = Some(product);
                best_count = *count;
            }
        }
        team.product = best.map(str::to_string);
    }
    applications.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    team.application_count = applications.len();
    team.applications = applications;
}

fn print_summary(attribution: &AttributionReport, total_teams: usize, color: bool) {
    let teams_with_apps = attribution.len();
    let total_applications: usize = attribution.values().map(|t| t.application_count).sum();
    println!();
    println!(
        "{}",
        paint(
            "=== Application Attribution Summary ===",
            Style::new().cyan(),
            color
        )
    );
    println!("Total teams: {total_teams}");
    println!("Teams with applications: {teams_with_apps}");
    println!("Total applications: {total_applications}");
    println!(
        "Average applications per team: {:.1}",
        total_applications as f64 / teams_with_apps as f64
    );

    let mut ranked: Vec<&TeamApplications> = attribution.values().collect();
    ranked.sort_by(|a, b| b.application_count.cmp(&a.application_count));
    println!();
    println!("Top teams by application count:");
    for team in ranked.iter().take(10) {
        println!(
            "{}",
            paint(
                &format!("  {}: {} applications", team.team_title, team.application_count),
                Style::new().green(),
                color
            )
        );
    }
    println!();
    println!(
        "{}",
        paint("Application attribution complete!", Style::new().green(), color)
    );
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}
