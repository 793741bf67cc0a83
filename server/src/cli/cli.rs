// server/src/cli/cli.rs

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use lib::config::{load_dispatch_config, DispatchConfig, StorageEngineType};
use lib::distance::create_ranker;
use lib::seed::{provision_from_seed, SeedFile};
use lib::storage_engine::build_storage;
use lib::AssignmentEngine;
use models::{EmergencyId, TargetDepartment};

use crate::cli::handlers;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Hospital assignment and bed allocation", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    /// Path to the dispatch YAML config (defaults to ./config/dispatch.yaml)
    #[clap(long, short = 'c', value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Provision hospitals and bed counters into an empty store
    Seed {
        #[clap(long, value_name = "PATH", help = "Seed YAML; falls back to seed_file from the config, then the built-in set")]
        file: Option<PathBuf>,
    },
    /// List hospitals with their bed counters
    Hospitals,
    /// Rank active hospitals by distance without reserving anything
    Nearest {
        #[clap(long, allow_hyphen_values = true)]
        lat: f64,
        #[clap(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Record a new emergency and assign it when it targets a hospital
    Report {
        #[clap(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[clap(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        #[clap(long, default_value = "hospital", help = "Target department: hospital, police or both")]
        department: TargetDepartment,
        #[clap(long)]
        description: Option<String>,
    },
    /// Retry assignment of a stored emergency
    Assign {
        #[clap(long)]
        id: EmergencyId,
    },
    /// Hospital rejection: release the bed and assign elsewhere
    Redirect {
        #[clap(long)]
        id: EmergencyId,
        #[clap(long)]
        reason: String,
    },
    /// Print a stored emergency record
    Show {
        #[clap(long)]
        id: EmergencyId,
    },
    /// Assign every stored emergency still waiting for a hospital
    Backfill,
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    run_command(args).await
}

/// Builds the engine from config and runs one command against it.
pub async fn run_command(args: CliArgs) -> Result<()> {
    let config = load_dispatch_config(args.config.as_deref())?;
    debug!("Effective config: {:?}", config);

    let bundle = build_storage(&config.storage, config.assignment.store_timeout())
        .context(format!("Failed to open {} storage at {}", config.storage.engine, config.storage.path.display()))?;

    // Nothing survives between in-memory runs, so provision on every start.
    if bundle.engine_type == StorageEngineType::InMemory {
        let seed = resolve_seed(&config, None)?;
        let provisioned = provision_from_seed(bundle.hospitals.as_ref(), bundle.capacity.as_ref(), &seed).await?;
        info!("Provisioned {} hospitals into in-memory storage", provisioned);
    }

    let ranker = create_ranker(&config.distance_matrix);
    let engine = AssignmentEngine::from_bundle(&bundle, ranker, config.assignment.clone());

    match args.command {
        Commands::Seed { file } => {
            let seed = resolve_seed(&config, file)?;
            handlers::handle_seed(&bundle, &seed).await
        }
        Commands::Hospitals => handlers::handle_hospitals(&engine).await,
        Commands::Nearest { lat, lng } => handlers::handle_nearest(&engine, lat, lng).await,
        Commands::Report { lat, lng, department, description } => {
            handlers::handle_report(&engine, lat.zip(lng), department, description).await
        }
        Commands::Assign { id } => handlers::handle_assign(&engine, id).await,
        Commands::Redirect { id, reason } => handlers::handle_redirect(&engine, id, &reason).await,
        Commands::Show { id } => handlers::handle_show(&engine, id).await,
        Commands::Backfill => handlers::handle_backfill(&engine).await,
    }
}

fn resolve_seed(config: &DispatchConfig, file: Option<PathBuf>) -> Result<SeedFile> {
    match file.or_else(|| config.seed_file.clone()) {
        Some(path) => lib::seed::load_seed_file(&path),
        None => Ok(SeedFile::builtin()),
    }
}
