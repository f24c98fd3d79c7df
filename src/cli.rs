use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::importers::{ImporterArgs, ImporterKind};

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Import(CliOptions),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub importer: ImporterArgs,
    /// Destination team; defaults to the importer's suggestion.
    pub team: Option<String>,
    /// Post comments from unmatched users as the API key owner.
    pub attribute_to_me: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Parse everything after the binary name.
///
/// Supported forms:
///   tracker-import github facebook/react --team Web
///   tracker-import jira-csv export.csv --jira-org acme
///   tracker-import trello-json board.json --include-archived --dry-run
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        bail!("{}", usage());
    };
    if matches!(first.as_str(), "-h" | "--help" | "help") {
        return Ok(Command::Help);
    }
    let Some(kind) = ImporterKind::parse(first) else {
        bail!("Unknown importer '{first}'\n\n{}", usage());
    };

    let mut target: Option<String> = None;
    let mut team = None;
    let mut jira_org = None;
    let mut include_archived = false;
    let mut attribute_to_me = false;
    let mut dry_run = false;
    let mut verbose = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--team" | "-t" => {
                i += 1;
                team = Some(flag_value(args, i, "--team")?);
            }
            "--jira-org" if kind == ImporterKind::JiraCsv => {
                i += 1;
                jira_org = Some(flag_value(args, i, "--jira-org")?);
            }
            "--include-archived" if kind == ImporterKind::TrelloJson => {
                include_archived = true;
            }
            "--attribute-to-me" => attribute_to_me = true,
            "--dry-run" => dry_run = true,
            "-v" | "--verbose" => verbose = true,
            other if other.starts_with('-') => {
                bail!("Unknown option '{other}' for {}", kind.as_str());
            }
            other => {
                if target.is_some() {
                    bail!("Unexpected argument '{other}'");
                }
                target = Some(other.to_string());
            }
        }
        i += 1;
    }

    let Some(target) = target else {
        match kind {
            ImporterKind::Github => bail!("Missing repository, e.g. `github owner/repo`"),
            _ => bail!("Missing export file for {}", kind.as_str()),
        }
    };

    let importer = match kind {
        ImporterKind::Github => ImporterArgs::Github { repo: target },
        ImporterKind::JiraCsv => ImporterArgs::JiraCsv {
            path: PathBuf::from(target),
            org: jira_org,
        },
        ImporterKind::AsanaCsv => ImporterArgs::AsanaCsv {
            path: PathBuf::from(target),
        },
        ImporterKind::PivotalCsv => ImporterArgs::PivotalCsv {
            path: PathBuf::from(target),
        },
        ImporterKind::TrelloJson => ImporterArgs::TrelloJson {
            path: PathBuf::from(target),
            include_archived,
        },
    };

    Ok(Command::Import(CliOptions {
        importer,
        team,
        attribute_to_me,
        dry_run,
        verbose,
    }))
}

fn flag_value(args: &[String], i: usize, flag: &str) -> Result<String> {
    match args.get(i) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => bail!("Missing value for {flag} flag"),
    }
}

fn usage() -> String {
    let kinds: Vec<&str> = ImporterKind::ALL.iter().map(|k| k.as_str()).collect();
    format!(
        "Usage: tracker-import <importer> <repo|file> [options]\n\nImporters: {}",
        kinds.join(", ")
    )
}

pub fn print_help() {
    println!("tracker-import: move issues from another tracker into Linear\n");
    println!("USAGE:");
    println!("  tracker-import github <owner/repo> [options]");
    println!("  tracker-import jira-csv <file> [--jira-org <name>] [options]");
    println!("  tracker-import asana-csv <file> [options]");
    println!("  tracker-import pivotal-csv <file> [options]");
    println!("  tracker-import trello-json <file> [--include-archived] [options]");
    println!();
    println!("IMPORTERS:");
    for kind in ImporterKind::ALL {
        println!("  {:<13} {}", kind.as_str(), kind.description());
    }
    println!();
    println!("OPTIONS:");
    println!("  -t, --team <name>    Destination team (created if missing)");
    println!("  --attribute-to-me    Post comments from unknown users as yourself");
    println!("  --dry-run            Extract and validate only, write nothing");
    println!("  -v, --verbose        Debug logging (RUST_LOG overrides)");
    println!("  -h, --help           Show this help");
    println!();
    println!("CREDENTIALS:");
    println!("  LINEAR_API_KEY and GITHUB_API_KEY, from the environment, a .env file,");
    println!("  or ~/.tracker-import/config.toml");
}
