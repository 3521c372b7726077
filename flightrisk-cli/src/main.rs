//! FlightRisk CLI - flight cancellation risk scoring

// Global invariants enforced:
// - Deterministic output ordering (input order for flights)
// - Identical input and an unchanged database yield byte-for-byte identical output
// - Diagnostics go to stderr; results go to stdout

use anyhow::Context;
use clap::{Parser, Subcommand};
use flightrisk_core::config::{self, ResolvedConfig};
use flightrisk_core::report::{render_stats_json, render_stats_text, HistoryStats};
use flightrisk_core::{
    grade, render_json, render_text, Calibration, HistoricalFlight, Outcome, OutcomeStore,
    PredictionEngine, ScoreRequest, ScoredFlight, SqliteOutcomeStore, StoredPrediction,
    WeatherReading,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flightrisk")]
#[command(about = "Weather-driven flight cancellation risk scoring")]
#[command(version = env!("FLIGHTRISK_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score flights from a JSON file (one request or an array of requests)
    Score {
        /// Path to input JSON
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Outcome database (overrides config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log each prediction to the history log for later grading
        #[arg(long)]
        log: bool,
    },
    /// Grade a prediction against the observed flight status
    Grade {
        /// Pre-outcome score to grade
        #[arg(long, conflicts_with = "flight_id", required_unless_present = "flight_id")]
        score: Option<f64>,

        /// Look up the logged prediction for this flight id
        #[arg(long)]
        flight_id: Option<String>,

        /// Observed status (cancelled, landed, departed, ...)
        #[arg(long)]
        status: String,

        /// Outcome database (overrides config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Record historical flight outcomes from a JSON array
    Record {
        /// Path to outcomes JSON
        input: PathBuf,

        /// Outcome database (overrides config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the calibration factor and the sample it was derived from
    Calibration {
        /// Outcome database (overrides config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show recent and monthly outcome statistics
    Stats {
        /// Trailing window for recent statistics
        #[arg(long, default_value = "30")]
        days: u32,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Outcome database (overrides config file)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// `score` accepts a single request or an array
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreInput {
    Batch(Vec<ScoreRequest>),
    Single(Box<ScoreRequest>),
}

/// `record` accepts a single outcome or an array
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordInput {
    Batch(Vec<HistoricalFlight>),
    Single(Box<HistoricalFlight>),
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            input,
            format,
            db,
            config: config_path,
            log,
        } => {
            let requests = match read_json::<ScoreInput>(&input)? {
                ScoreInput::Batch(requests) => requests,
                ScoreInput::Single(request) => vec![*request],
            };

            let (resolved, store) = open_store(config_path.as_deref(), db)?;
            let engine = PredictionEngine::new(&store, &resolved);
            let scores = engine.score_batch(&requests);

            if log {
                let logged_at = chrono::Utc::now().to_rfc3339();
                for (request, risk) in requests.iter().zip(&scores) {
                    store.log_prediction(&request.flight, &request.weather, risk, &logged_at)?;
                }
                eprintln!("Logged {} prediction(s)", scores.len());
            }

            let scored: Vec<ScoredFlight> = requests
                .into_iter()
                .zip(scores)
                .map(|(request, risk)| ScoredFlight {
                    flight: request.flight,
                    risk,
                })
                .collect();

            match format {
                OutputFormat::Text => print!("{}", render_text(&scored)),
                OutputFormat::Json => println!("{}", render_json(&scored)),
            }
        }
        Commands::Grade {
            score,
            flight_id,
            status,
            db,
            config: config_path,
        } => {
            let outcome = Outcome::from_status(&status).with_context(|| {
                format!("status '{status}' is not a final outcome; nothing to grade")
            })?;

            let (prediction, weather) = match (score, flight_id) {
                (Some(score), _) => (
                    StoredPrediction {
                        score,
                        level: flightrisk_core::risk::assign_risk_level(score),
                    },
                    None,
                ),
                (None, Some(id)) => {
                    let (_, store) = open_store(config_path.as_deref(), db)?;
                    let prediction = store
                        .logged_prediction(&id)?
                        .with_context(|| format!("no logged prediction for flight {id}"))?;
                    store.update_status(&id, &status)?;
                    (prediction, store.logged_weather(&id)?)
                }
                (None, None) => anyhow::bail!("either --score or --flight-id is required"),
            };

            let g = grade(&prediction, outcome);
            println!(
                "{} (score {:.1}, {}, {})",
                g.as_str(),
                prediction.score,
                prediction.level.as_str(),
                status
            );
            if let Some(weather) = weather {
                for (scope, reading) in [
                    ("local", &weather.local),
                    ("origin", &weather.origin),
                    ("destination", &weather.destination),
                ] {
                    if let Some(reading) = reading {
                        println!("  {scope} weather at prediction: {}", reading_summary(reading));
                    }
                }
            }
        }
        Commands::Record {
            input,
            db,
            config: config_path,
        } => {
            let outcomes = match read_json::<RecordInput>(&input)? {
                RecordInput::Batch(outcomes) => outcomes,
                RecordInput::Single(outcome) => vec![*outcome],
            };

            let (_, store) = open_store(config_path.as_deref(), db)?;
            let mut inserted = 0usize;
            for outcome in &outcomes {
                if store.record_outcome(outcome)? {
                    inserted += 1;
                }
            }
            println!(
                "Recorded {} new outcome(s), {} duplicate(s) skipped",
                inserted,
                outcomes.len() - inserted
            );
        }
        Commands::Calibration {
            db,
            config: config_path,
        } => {
            let (_, store) = open_store(config_path.as_deref(), db)?;
            let samples = store
                .calibration_inputs()
                .context("failed to read calibration inputs")?;
            let calibration = Calibration::from_samples(&samples);

            println!("Calibration factor: {:.3}", calibration.factor);
            println!("  Matched predictions: {}", calibration.samples);
            println!("  Cancellations: {}", calibration.cancellations);
            match calibration.ideal {
                Some(ideal) => println!("  Ideal ratio: {:.3}", ideal),
                None => println!("  Ideal ratio: - (default factor)"),
            }
        }
        Commands::Stats {
            days,
            format,
            db,
            config: config_path,
        } => {
            let (_, store) = open_store(config_path.as_deref(), db)?;
            let today = chrono::Local::now().date_naive();
            let stats = HistoryStats {
                range: store.history_range()?,
                recent: store.recent_stats(days, today)?,
                monthly: store.monthly_statistics()?,
            };

            match format {
                OutputFormat::Text => print!("{}", render_stats_text(&stats)),
                OutputFormat::Json => println!("{}", render_stats_json(&stats)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!("  Local airport: {}", resolved.local_airport);
                println!("  Database: {}", resolved.database.display());
                println!();
                println!("Runways:");
                for (code, headings) in resolved.runways.airports() {
                    let list = headings
                        .iter()
                        .map(|h| format!("{h:.0}"))
                        .collect::<Vec<_>>()
                        .join("/");
                    println!("  {}: {}", code, list);
                }
            }
        },
    }

    Ok(())
}

/// Install the stderr subscriber; `FLIGHTRISK_LOG` overrides the default `warn`
fn init_logging() {
    let filter = EnvFilter::try_from_env("FLIGHTRISK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve configuration and open the outcome database (`--db` wins over config)
fn open_store(
    config_path: Option<&Path>,
    db: Option<PathBuf>,
) -> anyhow::Result<(ResolvedConfig, SqliteOutcomeStore)> {
    let project_root = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&project_root, config_path)
        .context("failed to load configuration")?;

    if let Some(config_path) = &resolved.config_path {
        eprintln!("Using config: {}", config_path.display());
    }

    let db_path = db.unwrap_or_else(|| resolved.database.clone());
    tracing::debug!(database = %db_path.display(), "opening outcome store");
    let store = SqliteOutcomeStore::open(&db_path)?;
    Ok((resolved, store))
}

fn reading_summary(reading: &WeatherReading) -> String {
    let fmt = |v: Option<f64>, unit: &str| {
        v.map(|v| format!("{v:.1}{unit}"))
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "vis {}, wind {}, temp {}{}",
        fmt(reading.visibility_miles, "mi"),
        fmt(reading.effective_wind(), "kt"),
        fmt(reading.temperature_f, "F"),
        reading
            .conditions
            .as_deref()
            .map(|c| format!(", {c}"))
            .unwrap_or_default()
    )
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse input file: {}", path.display()))
}
