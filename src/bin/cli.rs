//! placematch CLI - infer home and work locations for user directories
//!
//! Usage:
//!   placematch-cli infer <user_dir> [--config <file>] [--geocode] [--db <file>]
//!   placematch-cli batch <data_dir> [--config <file>] [--geocode] [--db <file>]
//!
//! Each user directory holds `gps_samples_and_motion_score.csv` (or the
//! legacy `source.csv`) and `stops.csv`. Results are written back next to
//! them: samples with their `stop_id`, stops with coordinates, and
//! `significant_locations.json`.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use placematch::batch::process_user_dirs;
use placematch::tables::{UserDir, discover_users};
use placematch::{Inference, InferenceConfig, Result, SignificantLocation, infer};

#[derive(Parser)]
#[command(name = "placematch-cli")]
#[command(about = "Infer home and work locations from GPS samples and stops", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with inference settings (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve addresses of inferred locations (needs the `http` feature)
    #[arg(long, global = true)]
    geocode: bool,

    /// SQLite database to store locations in (needs the `persistence` feature)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer locations for one user directory
    Infer {
        /// Directory with the user's sample and stop tables
        user_dir: PathBuf,
    },

    /// Infer locations for every user directory under a data directory
    Batch {
        /// Directory containing one subdirectory per user
        data_dir: PathBuf,
    },
}

/// Output options shared by both commands.
struct Outputs {
    geocode: bool,
    db: Option<PathBuf>,
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outputs = Outputs {
        geocode: cli.geocode,
        db: cli.db,
        verbose: cli.verbose,
    };

    let result = match cli.command {
        Commands::Infer { user_dir } => run_infer(&user_dir, &config, &outputs),
        Commands::Batch { data_dir } => run_batch(&data_dir, &config, &outputs),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<InferenceConfig> {
    let config: InferenceConfig = match path {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => InferenceConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Run inference for a single user
fn run_infer(user_dir: &Path, config: &InferenceConfig, outputs: &Outputs) -> Result<()> {
    let dir = UserDir::new(user_dir);
    println!("\n{}", "=".repeat(60));
    println!("Inferring locations for: {}", dir.user());
    println!("{}", "=".repeat(60));

    let (samples, stops) = dir.load()?;
    let inference = infer(&samples, &stops, config)?;
    finish_user(&dir, &inference, outputs)
}

/// Run inference for every user under a data directory
fn run_batch(data_dir: &Path, config: &InferenceConfig, outputs: &Outputs) -> Result<()> {
    let dirs = discover_users(data_dir)?;
    println!("\n{}", "=".repeat(60));
    println!("Found {} users in: {}", dirs.len(), data_dir.display());
    println!("{}", "=".repeat(60));

    let reports = process_user_dirs(&dirs, config);

    let mut failed = 0usize;
    for (dir, report) in dirs.iter().zip(&reports) {
        match &report.result {
            Ok(inference) => {
                if let Err(e) = finish_user(dir, inference, outputs) {
                    eprintln!("  [ERR] {}: writing results failed: {}", report.user, e);
                    failed += 1;
                }
            }
            Err(e) => {
                eprintln!("  [ERR] {}: {}", report.user, e);
                failed += 1;
            }
        }
    }

    println!("\n{}", "-".repeat(60));
    println!(
        "RESULTS: {} users, {} succeeded, {} failed",
        reports.len(),
        reports.len() - failed,
        failed
    );
    println!("{}", "-".repeat(60));
    Ok(())
}

/// Annotate, store and write one user's results, then print them
fn finish_user(dir: &UserDir, inference: &Inference, outputs: &Outputs) -> Result<()> {
    let mut locations = inference.significant_locations();

    if outputs.geocode {
        geocode(&mut locations)?;
    }
    if let Some(db) = &outputs.db {
        store(db, &dir.user(), &locations)?;
    }
    dir.write_outputs(inference, &locations)?;

    print_user(&dir.user(), inference, &locations, outputs.verbose);
    Ok(())
}

#[cfg(feature = "http")]
fn geocode(locations: &mut [SignificantLocation]) -> Result<()> {
    use placematch::geocoding::{GeocoderConfig, NominatimGeocoder};

    let geocoder = NominatimGeocoder::new(GeocoderConfig::default())?;
    placematch::annotate_addresses(locations, &geocoder);
    Ok(())
}

#[cfg(not(feature = "http"))]
fn geocode(_locations: &mut [SignificantLocation]) -> Result<()> {
    Err(placematch::PlaceMatchError::InvalidConfig(
        "--geocode requires the `http` feature".to_string(),
    ))
}

#[cfg(feature = "persistence")]
fn store(db: &Path, user: &str, locations: &[SignificantLocation]) -> Result<()> {
    let mut store = placematch::LocationStore::open(&db.to_string_lossy())?;
    store.save(user, locations)
}

#[cfg(not(feature = "persistence"))]
fn store(_db: &Path, _user: &str, _locations: &[SignificantLocation]) -> Result<()> {
    Err(placematch::PlaceMatchError::InvalidConfig(
        "--db requires the `persistence` feature".to_string(),
    ))
}

fn print_user(user: &str, inference: &Inference, locations: &[SignificantLocation], verbose: bool) {
    let stats = &inference.stats;
    println!("\n  {}:", user);
    println!(
        "    Samples: {} ({} linked, {} unlinked)",
        stats.samples, stats.linked_samples, stats.unlinked_samples
    );
    println!(
        "    Stops: {} in {} clusters ({} placed from samples)",
        stats.stops, stats.clusters, stats.fallback_stops
    );

    let primary = &inference.work.primary;
    if verbose {
        println!(
            "    Primary work candidate: {:?}, {:.2}h over {} workdays ({:.2}h/day)",
            primary.cluster_id,
            primary.hours_worked,
            primary.number_of_workdays,
            primary.hours_per_workday
        );
        println!("    Work phase: {:?}", inference.work.phase);
    }

    for location in locations {
        println!(
            "    {:4} cluster {:>4}  ({:.5}, {:.5})  {}{}",
            location.role,
            location.cluster_id,
            location.latitude,
            location.longitude,
            location.address.as_deref().unwrap_or("-"),
            if location.has_multiple_workplaces {
                "  [multiple workplaces]"
            } else {
                ""
            }
        );
    }
    if inference.work.candidates.is_empty() {
        println!("    work: none found");
    }
}
