// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Tickwheel CLI - epic planning, catalog attribution, and ticket automation

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use tickwheel::commands;
use tickwheel::commands::consumers::ConsumerArgs;
use tickwheel::commands::create::CreateArgs;

#[derive(Parser)]
#[command(name = "tickwheel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "TICKWHEEL_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = clap::builder::BoolishValueParser::new())]
    no_color: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Order an epic's tickets into dependency rounds
    Plan {
        /// Epic issue key, e.g. PROJ-123
        epic_key: String,

        /// Also show transitive-only dependencies
        #[arg(short, long)]
        transitive: bool,
    },

    /// Evaluate an epic's plan sprint by sprint
    Status {
        /// Epic issue key
        epic_key: String,
    },

    /// Analyze development time spans of open epics
    Span {
        /// Restrict to one Jira project
        #[arg(long)]
        project: Option<String>,

        /// Restrict to one sprint team
        #[arg(long)]
        team: Option<String>,
    },

    /// List custom fields carrying values on an issue
    Fields {
        /// Issue key to examine
        issue_key: String,
    },

    /// Populate remaining estimates from original estimates
    Estimate {
        /// Query scope: assignee or team
        scope: String,

        /// Assignee or team name
        name: String,

        /// Apply the updates instead of previewing them
        #[arg(long)]
        apply: bool,
    },

    /// Find subtasks owned by someone other than their parent's owner
    Subtasks {
        /// Jira project key
        #[arg(long)]
        project: String,

        /// Restrict to one assignee
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Attribute Backstage applications to their owning teams
    Attribution {
        /// Restrict to one team
        #[arg(short, long)]
        team: Option<String>,

        /// Output file (defaults to <team>_applications.json)
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Analyze service consumers across domains from Datadog traces
    Consumers {
        /// Attribution report produced by the attribution command
        input_file: std::path::PathBuf,

        /// Datadog environment to query, e.g. prod
        environment: String,

        /// Restrict to one team from the input file
        #[arg(short, long)]
        team: Option<String>,

        /// Directory receiving the per-domain reports
        #[arg(long, default_value = ".")]
        output_dir: std::path::PathBuf,

        /// Seconds to wait between Datadog requests
        #[arg(long, default_value_t = 1.0)]
        delay: f64,

        /// Maximum consumers to record per service
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Create scorecard improvement tickets from a team manifest
    Create {
        /// Manifest file mapping teams to ticket settings
        manifest: std::path::PathBuf,

        /// Only process these manifest teams (repeatable, comma-splittable)
        #[arg(long = "team")]
        teams: Vec<String>,

        /// Process every manifest team except these
        #[arg(long = "exclude-team", conflicts_with = "teams")]
        exclude_teams: Vec<String>,

        /// Create tickets in Jira instead of simulating
        #[arg(long)]
        apply: bool,

        /// Skip the interactive confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Get or set configuration
    Config {
        /// Action: init, set, get, show, path
        action: String,

        /// Configuration key
        key: Option<String>,

        /// Value to set
        value: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => tracing::Level::ERROR,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let color = !cli.no_color && !cli.json;
    let config_path = cli.config.as_deref();

    // Execute command
    match &cli.command {
        Commands::Plan { epic_key, transitive } => {
            commands::plan::run(epic_key, *transitive, config_path, cli.json, color)
        }
        Commands::Status { epic_key } => {
            commands::status::run(epic_key, config_path, cli.json, color)
        }
        Commands::Span { project, team } => {
            commands::span::run(project.as_deref(), team.as_deref(), config_path, cli.json)
        }
        Commands::Fields { issue_key } => {
            commands::fields::run(issue_key, config_path, cli.json, color)
        }
        Commands::Estimate { scope, name, apply } => {
            commands::estimate::run(scope, name, *apply, config_path, color)
        }
        Commands::Subtasks { project, assignee } => {
            commands::subtasks::run(project, assignee.as_deref(), config_path, cli.json)
        }
        Commands::Attribution { team, output } => commands::attribution::run(
            team.as_deref(),
            output.as_deref(),
            config_path,
            cli.json,
            color,
        ),
        Commands::Consumers {
            input_file,
            environment,
            team,
            output_dir,
            delay,
            limit,
        } => {
            let args = ConsumerArgs {
                environment: environment.clone(),
                team: team.clone(),
                output_dir: output_dir.clone(),
                delay: *delay,
                limit: *limit,
            };
            commands::consumers::run(input_file, &args, config_path, cli.json, color)
        }
        Commands::Create {
            manifest,
            teams,
            exclude_teams,
            apply,
            yes,
        } => {
            let args = CreateArgs {
                teams: teams.clone(),
                exclude_teams: exclude_teams.clone(),
                apply: *apply,
                yes: *yes,
            };
            commands::create::run(manifest, &args, config_path, color)
        }
        Commands::Config { action, key, value } => {
            commands::config::run(action, key.as_deref(), value.as_deref(), config_path)
        }
        Commands::Completions { shell } => {
            commands::completions::run(*shell, &mut Cli::command())
        }
    }
}
