// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Analyze service consumers across domains from Datadog traces

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use owo_colors::{OwoColorize, Style};

use crate::config;
use crate::datadog::DatadogClient;
use crate::types::{AttributionReport, ConsumerSummary, DomainConsumerReport};

/// Arguments for consumer analysis
pub struct ConsumerArgs {
    /// Datadog environment to query, e.g. `prod`
    pub environment: String,
    /// Restrict the analysis to one team from the input file
    pub team: Option<String>,
    /// Directory receiving the per-domain reports
    pub output_dir: PathBuf,
    /// Seconds to wait between Datadog requests
    pub delay: f64,
    /// Maximum consumers to record per service
    pub limit: usize,
}

/// Run the consumers command
pub fn run(
    input_file: &Path,
    args: &ConsumerArgs,
    config_path: Option<&Path>,
    json: bool,
    color: bool,
) -> Result<()> {
    let cfg = config::load(config_path)?;

    if !json {
        println!("Loading attribution data from: {}", input_file.display());
    }
    let raw = fs::read_to_string(input_file)
        .with_context(|| format!("Failed to read {}", input_file.display()))?;
    let mut attribution: AttributionReport = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", input_file.display()))?;
    if !json {
        println!("  Loaded {} teams", attribution.len());
    }

    if let Some(team) = args.team.as_deref() {
        let matched = attribution
            .iter()
            .find(|(key, info)| {
                key.eq_ignore_ascii_case(team)
                    || info.team_name.eq_ignore_ascii_case(team)
                    || info.team_title.eq_ignore_ascii_case(team)
            })
            .map(|(key, info)| (key.clone(), info.team_title.clone()));
        let Some((key, title)) = matched else {
            if !json {
                println!("Available teams:");
                for info in attribution.values().take(10) {
                    println!("  - {}", info.team_title);
                }
                if attribution.len() > 10 {
                    println!("  ... and {} more", attribution.len() - 10);
                }
            }
            bail!("Team '{}' not found in input file", team);
        };
        attribution.retain(|name, _| *name == key);
        if !json {
            println!(
                "{}",
                paint(
                    &format!("  Filtering to single team: {title}"),
                    Style::new().green(),
                    color
                )
            );
        }
    }

    if !json {
        println!(
            "Initializing Datadog client: {}",
            cfg.datadog_base_url().unwrap_or_default()
        );
        println!(
            "Rate limit delay: {} seconds between requests",
            args.delay
        );
    }
    let client = DatadogClient::from_config(&cfg, Duration::from_secs_f64(args.delay))?;

    // Every catalog service maps to its owning team's domain; callers
    // outside the catalog group under External/Unknown.
    let mut service_domains: BTreeMap<String, String> = BTreeMap::new();
    for info in attribution.values() {
        let domain = info.domain.clone().unwrap_or_else(|| "Unknown".to_string());
        for app in &info.applications {
            service_domains.insert(app.name.clone(), domain.clone());
        }
    }

    let total: usize = attribution.values().map(|info| info.applications.len()).sum();
    if !json {
        println!();
        println!("Starting consumer analysis for {total} services...");
        println!();
    }

    let mut domain_consumers: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut system_consumers: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut processed = 0usize;
    for info in attribution.values() {
        let team_domain = info.domain.clone().unwrap_or_else(|| "Unknown".to_string());
        if !json {
            println!(
                "{}",
                paint(
                    &format!("Analyzing team: {} (Domain: {})", info.team_title, team_domain),
                    Style::new().green(),
                    color
                )
            );
            println!("  Applications: {}", info.applications.len());
        }
        for app in &info.applications {
            let system = app.system.clone().unwrap_or_else(|| "Unknown".to_string());
            processed += 1;
            if !json {
                println!("  [{processed}/{total}] Querying consumers for: {}", app.name);
            }
            let consumers = client.service_consumers(&args.environment, &app.name, args.limit);
            for (service, count) in &consumers {
                let consumer_domain = service_domains
                    .get(service)
                    .cloned()
                    .unwrap_or_else(|| "External/Unknown".to_string());
                *domain_consumers
                    .entry(team_domain.clone())
                    .or_default()
                    .entry(consumer_domain)
                    .or_default() += count;
                *system_consumers
                    .entry(team_domain.clone())
                    .or_default()
                    .entry(system.clone())
                    .or_default() += count;
            }
            if !json {
                println!("    Found {} consumers", consumers.len());
            }
        }
    }

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    if !json {
        println!();
        println!("Generating domain reports...");
        println!();
    }
    for (domain, consumers) in &domain_consumers {
        let systems = system_consumers.get(domain).cloned().unwrap_or_default();
        let report = DomainConsumerReport {
            domain: domain.clone(),
            environment: args.environment.clone(),
            total_calls_received: consumers.values().sum(),
            unique_consuming_domains: consumers.len(),
            unique_systems: systems.len(),
            consumer_domains: consumers.clone(),
            consumer_by_system: systems,
        };
        let file_name = format!(
            "{}_consumer_report.json",
            domain.to_lowercase().replace(' ', "_").replace('/', "_")
        );
        let path = args.output_dir.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !json {
            println!(
                "{}",
                paint(
                    &format!("Generated report: {}", path.display()),
                    Style::new().green(),
                    color
                )
            );
            println!("  Total calls received: {}", report.total_calls_received);
            println!("  Consuming domains: {}", report.unique_consuming_domains);
            println!("  Systems involved: {}", report.unique_systems);
        }
    }

    let summary = ConsumerSummary {
        environment: args.environment.clone(),
        domains_analyzed: domain_consumers.keys().cloned().collect(),
        domain_reports: domain_consumers,
        system_reports: system_consumers,
    };
    let summary_path = args.output_dir.join("consumer_analysis_summary.json");
    let serialized = serde_json::to_string_pretty(&summary)?;
    fs::write(&summary_path, &serialized)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    if json {
        println!("{serialized}");
        return Ok(());
    }
    println!();
    println!(
        "{}",
        paint(
            &format!("Generated summary report: {}", summary_path.display()),
            Style::new().green(),
            color
        )
    );
    println!();
    println!(
        "{}",
        paint("Consumer analysis complete!", Style::new().green(), color)
    );
    Ok(())
}

fn paint(text: &str, style: Style, color: bool) -> String {
    if color {
        format!("{}", text.style(style))
    } else {
        text.to_string()
    }
}
