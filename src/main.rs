//! Flow Sentinel - Command line entry point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use flow_sentinel::constants::APP_VERSION;
use flow_sentinel::logic::alert::{AlertPolicy, AlertStore, SqliteAlertStore};
use flow_sentinel::logic::config::Config;
use flow_sentinel::logic::error::Result;
use flow_sentinel::logic::features::{extract_all, read_features_csv, write_features_csv};
use flow_sentinel::logic::flow::read_flows_csv;
use flow_sentinel::logic::model::{save_artifact, train, AnomalyDetector, EngineStatus, ModelArtifact};
use flow_sentinel::logic::pipeline::{JobRunner, ScoringPass};

/// Flow-level network anomaly detection with a reconstruction autoencoder
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of environment configuration
#[derive(Args, Debug)]
struct GlobalArgs {
    /// Model artifact path (overrides MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Alert database path (overrides ALERT_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Alert threshold (overrides ANOMALY_THRESHOLD)
    #[arg(long, global = true)]
    threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a capture file into flow rows
    Flows {
        /// pcap file to read
        pcap: PathBuf,

        #[arg(short, long, default_value = "flows.csv")]
        out: PathBuf,
    },

    /// Derive feature rows from flow rows
    Features {
        flows: PathBuf,

        #[arg(short, long, default_value = "features.csv")]
        out: PathBuf,
    },

    /// Train the autoencoder on benign feature rows
    Train {
        features: PathBuf,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        #[arg(long)]
        learning_rate: Option<f32>,

        /// Seed for reproducible training
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Score flow rows (or feature rows) and store alerts
    Score {
        input: PathBuf,

        /// Input holds feature rows instead of flow rows
        #[arg(long)]
        features: bool,
    },

    /// Print the most recent alerts as JSON
    Alerts {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print configuration and model status
    Status,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    apply_overrides(&mut config, &cli.global);

    log::debug!("Flow Sentinel v{} with {:?}", APP_VERSION, config);

    if let Err(e) = run(cli.command, &config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn apply_overrides(config: &mut Config, global: &GlobalArgs) {
    if let Some(model) = &global.model {
        config.model_path = model.clone();
    }
    if let Some(db) = &global.db {
        config.alert_db_path = db.clone();
    }
    if let Some(threshold) = global.threshold {
        config.threshold = threshold;
    }
}

fn run(command: Command, config: &Config) -> Result<()> {
    config.validate()?;

    match command {
        Command::Flows { pcap, out } => cmd_flows(&pcap, &out),
        Command::Features { flows, out } => {
            let vectors = extract_all(&read_flows_csv(&flows)?);
            write_features_csv(&vectors, &out)?;
            Ok(())
        }
        Command::Train { features, epochs, batch_size, learning_rate, seed } => {
            let mut training = config.training.clone();
            training.epochs = epochs.unwrap_or(training.epochs);
            training.batch_size = batch_size.unwrap_or(training.batch_size);
            training.learning_rate = learning_rate.unwrap_or(training.learning_rate);
            training.seed = seed.or(training.seed);

            let vectors = read_features_csv(&features)?;
            let trained = train(&vectors, &training)?;
            save_artifact(&ModelArtifact::from_trained(&trained), &config.model_path)?;

            print_json(&trained.report)
        }
        Command::Score { input, features } => cmd_score(&input, features, config),
        Command::Alerts { limit } => {
            let store = SqliteAlertStore::open(&config.alert_db_path)?;
            let alerts = store.recent(limit.unwrap_or(config.recent_limit))?;
            print_json(&alerts)
        }
        Command::Status => {
            let engine = match AnomalyDetector::load(&config.model_path) {
                Ok(detector) => detector.status(config.threshold),
                Err(e) => {
                    log::warn!("Model not available: {}", e);
                    EngineStatus::unloaded(&config.model_path, config.threshold)
                }
            };
            print_json(&serde_json::json!({ "config": config, "engine": engine }))
        }
    }
}

#[cfg(feature = "pcap")]
fn cmd_flows(pcap: &Path, out: &Path) -> Result<()> {
    use flow_sentinel::logic::capture::read_pcap;
    use flow_sentinel::logic::flow::{aggregate, write_flows_csv};

    let packets = read_pcap(pcap)?;
    write_flows_csv(&aggregate(&packets), out)?;
    Ok(())
}

#[cfg(not(feature = "pcap"))]
fn cmd_flows(pcap: &Path, _out: &Path) -> Result<()> {
    use flow_sentinel::logic::error::SentinelError;

    Err(SentinelError::Input(format!(
        "Cannot read {}: built without the `pcap` feature",
        pcap.display()
    )))
}

fn cmd_score(input: &Path, features: bool, config: &Config) -> Result<()> {
    let detector = Arc::new(AnomalyDetector::load(&config.model_path)?);
    let store = Arc::new(SqliteAlertStore::open(&config.alert_db_path)?);
    let runner = JobRunner::new(ScoringPass::new(detector, AlertPolicy::new(config.threshold)), store);

    let handle = if features {
        runner.submit_features(read_features_csv(input)?)?
    } else {
        runner.submit(read_flows_csv(input)?)?
    };
    log::info!("Submitted scoring job {}", handle.id());

    let summary = handle.wait()?;
    print_json(&summary)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
