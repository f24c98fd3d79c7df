mod cli;
mod config;
mod destination;
mod error;
mod importers;
mod logging;
mod model;
mod orchestrator;
mod retry;
mod util;

use anyhow::{bail, Result};
use tracing::{info, warn};

use cli::{CliOptions, Command};
use config::{AppConfig, UnmatchedUsers};
use destination::linear::LinearDestination;
use importers::Importer;
use orchestrator::{ImportOrchestrator, OrchestratorOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match cli::parse_args(&args)? {
        Command::Help => {
            cli::print_help();
            return Ok(());
        }
        Command::Import(opts) => opts,
    };

    logging::init_tracing(opts.verbose);
    let config = config::load_config()?;

    // Both credentials are checked before anything talks to the network.
    let linear_key = if opts.dry_run {
        None
    } else {
        Some(config.linear_api_key()?.to_string())
    };
    let importer = importers::create_importer(&config, &opts.importer)?;
    info!(
        importer = opts.importer.kind().as_str(),
        dry_run = opts.dry_run,
        "starting import"
    );

    match linear_key {
        None => dry_run(importer.as_ref(), &opts).await,
        Some(api_key) => run_import(importer.as_ref(), &config, &opts, api_key).await,
    }
}

async fn dry_run(importer: &dyn Importer, opts: &CliOptions) -> Result<()> {
    let result = importer.import().await?;
    let team = opts
        .team
        .as_deref()
        .unwrap_or_else(|| importer.default_team_name());

    println!("Dry run for {} into team \"{team}\"", importer.name());
    println!("  Issues:   {}", result.issues.len());
    println!("  Comments: {}", result.comment_count());
    println!("  Labels:   {}", result.labels.len());
    println!("  Users:    {}", result.users.len());

    let violations = result.validate();
    if !violations.is_empty() {
        for violation in &violations {
            warn!("{violation}");
        }
        bail!("{} problems found in extracted data", violations.len());
    }
    Ok(())
}

async fn run_import(
    importer: &dyn Importer,
    config: &AppConfig,
    opts: &CliOptions,
    api_key: String,
) -> Result<()> {
    let destination = LinearDestination::new(
        config.linear_api_url().to_string(),
        api_key,
        config.import.retry_policy(),
    );
    let options = OrchestratorOptions {
        team_name: opts.team.clone(),
        unmatched_users: if opts.attribute_to_me {
            UnmatchedUsers::Importer
        } else {
            config.import.unmatched_users
        },
        concurrency: config.import.concurrency,
    };

    let summary = ImportOrchestrator::new(&destination, options)
        .run(importer)
        .await?;
    println!("Imported from {} into team {}", importer.name(), summary.team_id);
    print!("{summary}");

    if summary.has_failures() {
        bail!("Import finished with failures");
    }
    Ok(())
}
