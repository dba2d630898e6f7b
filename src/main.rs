// Housing price predictor
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use housing_predictor::config::{load_config, Config};
use housing_predictor::errors::{
    dataset_error, tracking_store_missing_error, ServiceError, UserFriendlyError,
};
use housing_predictor::monitor::AlertMonitor;
use housing_predictor::resolver::{CachePolicy, ModelCache, ModelResolver};
use housing_predictor::server::PredictionServer;
use housing_predictor::tracking::{FileStore, RunStore, Stage};
use housing_predictor::training::Trainer;

#[derive(Parser, Debug)]
#[command(name = "housing-predictor")]
#[command(about = "Train, track and serve a housing price model", version)]
struct Args {
    /// Path to a TOML config file (default: ./housing.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Train a model and record it as a new run
    Train {
        /// CSV dataset with `area` and `price` columns
        #[arg(long)]
        data: Option<PathBuf>,
        /// Fraction of rows held out for evaluation
        #[arg(long)]
        test_size: Option<f64>,
        /// Seed for the train/test shuffle
        #[arg(long)]
        seed: Option<u64>,
        /// Run name recorded with the run
        #[arg(long)]
        run_name: Option<String>,
    },
    /// Register a run's model as a new version
    Register {
        /// Run to register
        #[arg(long)]
        run_id: String,
        /// Registered model name (default: configured registered_model)
        #[arg(long)]
        name: Option<String>,
        /// Immediately move the new version to this stage
        #[arg(long)]
        stage: Option<Stage>,
    },
    /// Move a registered version to another stage
    Promote {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        version: u32,
        #[arg(long)]
        stage: Stage,
    },
    /// List runs of the configured experiment, newest first
    Runs,
    /// Show which model the server would load right now
    Resolve,
    /// Run the HTTP prediction server
    Serve {
        /// Bind address (default from config: 127.0.0.1:8000)
        #[arg(long)]
        bind: Option<String>,
        /// Cache policy: startup, per_request, ttl or ttl:<seconds>
        #[arg(long)]
        cache: Option<CachePolicy>,
    },
    /// Watch the server log and alert on high error rates
    Monitor {
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { bind, cache } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            let _guard = init_tracing(config.server.log_file.as_ref())?;
            run_serve(config, cache).await
        }
        Command::Monitor { log_file } => {
            if let Some(log_file) = log_file {
                config.monitor.log_file = log_file;
            }
            init_tracing(None)?;
            run_monitor(config).await
        }
        Command::Train {
            data,
            test_size,
            seed,
            run_name,
        } => {
            init_tracing(None)?;
            if let Some(data) = data {
                config.training.data_path = data;
            }
            if let Some(test_size) = test_size {
                config.training.test_size = test_size;
            }
            if let Some(seed) = seed {
                config.training.random_seed = seed;
            }
            if let Some(run_name) = run_name {
                config.training.run_name = run_name;
            }
            run_train(&config)
        }
        Command::Register {
            run_id,
            name,
            stage,
        } => {
            init_tracing(None)?;
            run_register(&config, &run_id, name, stage)
        }
        Command::Promote {
            name,
            version,
            stage,
        } => {
            init_tracing(None)?;
            let store = open_store(&config)?;
            let name = registered_name(&config, name)?;
            let entry = store.transition_stage(&name, version, stage)?;
            println!("{} version {} is now {}", entry.name, entry.version, entry.stage);
            Ok(())
        }
        Command::Runs => {
            init_tracing(None)?;
            run_list_runs(&config)
        }
        Command::Resolve => {
            init_tracing(None)?;
            run_resolve(&config)
        }
    }
}

/// Console logging, plus an append-only file layer when `log_file` is set
fn init_tracing(log_file: Option<&PathBuf>) -> Result<Option<Arc<std::fs::File>>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(Arc::new(file))
        }
        None => None,
    };

    // No ANSI colors in the log file: the monitor pattern-matches its lines
    let file_layer = file.clone().map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(move || file.clone())
            .with_ansi(false)
    });

    // Also bridges the log crate (tracing-subscriber's tracing-log feature)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = log_file {
        eprintln!("Server logs: {}", path.display());
    }
    Ok(file)
}

fn open_store(config: &Config) -> Result<FileStore> {
    Ok(FileStore::new(config.tracking_dir()?))
}

fn registered_name(config: &Config, name: Option<String>) -> Result<String> {
    name.or_else(|| config.registered_model.clone()).context(
        "No registered model name given: pass --name or set HOUSING_REGISTERED_MODEL",
    )
}

fn run_train(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let training = config.training_config();
    let data_path = training.data_path.display().to_string();

    let result = match Trainer::new(&store, training).run() {
        Ok(result) => result,
        Err(ServiceError::Dataset(msg)) => anyhow::bail!(dataset_error(&data_path, &msg)),
        Err(e) => return Err(e).context("Training failed"),
    };

    let m = &result.metrics;
    println!("R^2: {}, MSE: {}, RMSE: {}, MAE: {}", m.r2, m.mse, m.rmse, m.mae);
    println!(
        "Model: price = {:.4} * area + {:.4}",
        result.model.coefficient, result.model.intercept
    );
    println!("Run ID: {}", result.run.run_id);
    println!(
        "Train/test rows: {}/{}",
        result.split.train.len(),
        result.split.test.len()
    );
    Ok(())
}

fn run_register(
    config: &Config,
    run_id: &str,
    name: Option<String>,
    stage: Option<Stage>,
) -> Result<()> {
    let store = open_store(config)?;
    let name = registered_name(config, name)?;

    let mut entry = store
        .register_model(&name, run_id)
        .map_err(anyhow::Error::from)
        .user_context_with_suggestion(
            &format!("Failed to register run {}", run_id),
            "list available runs with `housing-predictor runs`",
        )?;

    if let Some(stage) = stage {
        entry = store.transition_stage(&name, entry.version, stage)?;
    }

    println!(
        "Registered model: {} version: {} stage: {}",
        entry.name, entry.version, entry.stage
    );
    Ok(())
}

fn run_list_runs(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let experiment = match store.find_experiment(&config.experiment_name) {
        Ok(experiment) => experiment,
        Err(ServiceError::NotFound(_)) if !store.root().exists() => {
            anyhow::bail!(tracking_store_missing_error(&store.location()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut runs = store.list_runs(&experiment.experiment_id)?;
    runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    println!(
        "Experiment {} ({}), {} run(s)",
        experiment.name,
        experiment.experiment_id,
        runs.len()
    );
    for run in runs {
        let metric = |key: &str| {
            run.metrics
                .get(key)
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{}  {}  {}  r2={}  rmse={}",
            run.run_id,
            run.start_time.to_rfc3339(),
            run.run_name,
            metric("r2_score"),
            metric("rmse")
        );
    }
    Ok(())
}

fn run_resolve(config: &Config) -> Result<()> {
    let store: Arc<dyn RunStore> = Arc::new(open_store(config)?);
    let resolver = ModelResolver::from_settings(store, &config.resolver_settings());

    println!("Strategies: {}", resolver.describe().join(" -> "));
    let resolved = resolver.resolve().context("Model resolution failed")?;
    println!(
        "Resolved run {} (experiment {}) via {}{}",
        resolved.run_id(),
        resolved.experiment_id(),
        resolved.source,
        resolved
            .version
            .map(|v| format!(", version {}", v))
            .unwrap_or_default()
    );
    println!("Artifact: {}", resolved.location);
    Ok(())
}

async fn run_serve(config: Config, cache_override: Option<CachePolicy>) -> Result<()> {
    let store: Arc<dyn RunStore> = Arc::new(open_store(&config)?);
    let resolver = Arc::new(ModelResolver::from_settings(
        store,
        &config.resolver_settings(),
    ));
    let policy = match cache_override {
        Some(policy) => policy,
        None => config.cache.policy()?,
    };

    tracing::info!(
        tracking = %config.tracking_uri,
        strategies = ?resolver.describe(),
        "Model resolution configured"
    );

    let cache = Arc::new(ModelCache::new(resolver, policy));
    PredictionServer::new(config.server.clone(), cache).serve().await
}

async fn run_monitor(config: Config) -> Result<()> {
    let notifier = AlertMonitor::notifier_for(&config.monitor)?;
    let monitor = AlertMonitor::new(&config.monitor, notifier)?;
    let poll_interval = config.monitor.poll_interval();

    tokio::select! {
        _ = monitor.run(poll_interval) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Log monitor stopped");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_writes_plain_log_file_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("logs").join("logs.txt");

        let file = init_tracing(Some(&log_path)).unwrap();
        assert!(file.is_some());
        tracing::error!("Request failed");

        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("ERROR"), "log was: {}", text);
        assert!(!text.contains('\x1b'), "ANSI codes in log file: {:?}", text);

        // A second install is reported, not swallowed
        assert!(init_tracing(None).is_err());
    }
}
