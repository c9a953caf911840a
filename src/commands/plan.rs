// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Order an epic's tickets into dependency rounds

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::config;
use crate::graph::TicketGraph;
use crate::jira::JiraClient;

/// Run the plan command
pub fn run(
    epic_key: &str,
    transitive: bool,
    config_path: Option<&Path>,
    json: bool,
    color: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let client = JiraClient::from_config(&cfg)?;

    let epic = client
        .issue(epic_key)
        .with_context(|| format!("Failed to fetch epic {epic_key}"))?;
    let type_name = epic
        .fields
        .issuetype
        .as_ref()
        .map_or("Unknown", |t| t.name.as_str());
    if !type_name.eq_ignore_ascii_case("epic") {
        bail!("{} is not an Epic (issue type: {})", epic_key, type_name);
    }

    let children = client
        .search(
            &format!("\"Epic Link\" = {epic_key}"),
            &["summary", "status", "issuelinks"],
        )
        .context("Failed to search for epic children")?;

    let mut graph = TicketGraph::new();
    let mut statuses: BTreeMap<String, String> = BTreeMap::new();
    let mut summaries: BTreeMap<String, String> = BTreeMap::new();
    for issue in &children {
        graph.add_ticket(&issue.key);
        statuses.insert(issue.key.clone(), issue.fields.status_name().to_string());
        summaries.insert(
            issue.key.clone(),
            issue.fields.summary.clone().unwrap_or_default(),
        );
    }

    // An outward "Blocks" link makes this ticket a predecessor of the
    // target. Links pointing outside the epic are ignored.
    for issue in &children {
        for link in &issue.fields.issuelinks {
            if !link.link_type.name.eq_ignore_ascii_case("blocks") {
                continue;
            }
            let Some(target) = &link.outward_issue else {
                continue;
            };
            if target.key != issue.key && graph.contains(&target.key) {
                graph.add_dependency(&issue.key, &target.key);
            }
        }
    }

    let rounds = graph.rounds()?;

    if json {
        return print_json(epic_key, &rounds, &graph, &statuses, &summaries, transitive);
    }
    print_rounds(&rounds, &graph, &statuses, &summaries, transitive, color);
    Ok(())
}

/// Print rounds with the done/ready/waiting and done/pending dependency legend
fn print_rounds(
    rounds: &[Vec<String>],
    graph: &TicketGraph,
    statuses: &BTreeMap<String, String>,
    summaries: &BTreeMap<String, String>,
    transitive: bool,
    color: bool,
) {
    let done_style = Style::new().green().bold();
    let ready_style = Style::new().cyan().bold();
    let waiting_style = Style::new().cyan().dimmed();
    let met_style = Style::new().green();
    let unmet_style = Style::new().red();
    let bold = Style::new().bold();

    println!(
        "{}",
        paint(
            "Ordered tickets with dependencies and summaries, grouped by round.",
            bold,
            color
        )
    );
    println!(
        "Work that is done is {}, work that is ready is {}, and work that isn't ready is {}.",
        paint("bright green", done_style, color),
        paint("bright cyan", ready_style, color),
        paint("dim cyan", waiting_style, color),
    );
    println!(
        "Dependencies that are in a completed state are {}, while those that are not are {}.",
        paint("green", met_style, color),
        paint("red", unmet_style, color),
    );

    for (index, round) in rounds.iter().enumerate() {
        println!();
        println!("{}", paint(&format!("Round {}:", index + 1), bold, color));
        for key in round {
            let deps = graph.direct_predecessors(key);
            let is_done = ticket_done(statuses, key);
            let ready = deps.iter().all(|dep| ticket_done(statuses, dep));

            let key_style = if is_done {
                done_style
            } else if ready {
                ready_style
            } else {
                waiting_style
            };
            let mut line = format!(
                "  {}: {}",
                paint(key, key_style, color),
                summaries.get(key).map_or("", String::as_str),
            );
            if !deps.is_empty() {
                line.push_str(&format!(
                    " - {}",
                    render_deps(deps.iter(), statuses, met_style, unmet_style, color)
                ));
            }
            if transitive {
                let extra = graph.transitive_only_predecessors(key);
                if !extra.is_empty() {
                    line.push_str(&format!(
                        " transitive {}",
                        render_deps(extra.iter(), statuses, met_style, unmet_style, color)
                    ));
                }
            }
            println!("{line}");
        }
    }
}

#[derive(Serialize)]
struct RoundTicket {
    key: String,
    status: String,
    summary: String,
    dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transitive: Vec<String>,
}

#[derive(Serialize)]
struct PlanReport {
    epic: String,
    rounds: Vec<Vec<RoundTicket>>,
}

fn print_json(
    epic_key: &str,
    rounds: &[Vec<String>],
    graph: &TicketGraph,
    statuses: &BTreeMap<String, String>,
    summaries: &BTreeMap<String, String>,
    transitive: bool,
) -> Result<()> {
    let report = PlanReport {
        epic: epic_key.to_string(),
        rounds: rounds
            .iter()
            .map(|round| {
                round
                    .iter()
                    .map(|key| RoundTicket {
                        key: key.clone(),
                        status: statuses.get(key).cloned().unwrap_or_default(),
                        summary: summaries.get(key).cloned().unwrap_or_default(),
                        dependencies: graph.direct_predecessors(key).into_iter().collect(),
                        transitive: if transitive {
                            graph.transitive_only_predecessors(key).into_iter().collect()
                        } else {
                            Vec::new()
                        },
                    })
                    .collect()
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn ticket_done(statuses: &BTreeMap<String, String>, key: &str) -> bool {
    statuses
        .get(key)
        .is_some_and(|status| crate::types::status_is_done(status))
}

/// Render a dependency list as `[A, B]` with met/unmet coloring
fn render_deps<'a>(
    deps: impl Iterator<Item = &'a String>,
    statuses: &BTreeMap<String, String>,
    met_style: Style,
    unmet_style: Style,
    color: bool,
) -> String {
    let rendered: Vec<String> = deps
        .map(|dep| {
            let style = if ticket_done(statuses, dep) {
                met_style
            } else {
                unmet_style
            };
            paint(dep, style, color)
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}
