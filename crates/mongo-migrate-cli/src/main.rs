//! mongo-migrate CLI - MongoDB migration with mongodump and mongorestore.

use clap::{Parser, Subcommand, ValueEnum};
use mongo_migrate::error::EXIT_CONNECTIVITY_ERROR;
use mongo_migrate::{
    CheckStatus, Config, Endpoint, LogEvent, MigrateError, MigrationMode, Orchestrator,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mongo-migrate")]
#[command(about = "MongoDB migration driven by mongodump and mongorestore")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    /// Print migration events as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    SingleDatabase,
    WholeInstance,
}

impl From<ModeArg> for MigrationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SingleDatabase => MigrationMode::SingleDatabase,
            ModeArg::WholeInstance => MigrationMode::WholeInstance,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Source,
    Target,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration
    Run {
        /// Override migration mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Override source database name
        #[arg(long)]
        source_db: Option<String>,

        /// Override target database name
        #[arg(long)]
        target_db: Option<String>,

        /// Restrict a whole-instance migration to this database (repeatable)
        #[arg(long = "database", value_name = "NAME")]
        databases: Vec<String>,

        /// Keep existing target collections instead of dropping them
        #[arg(long)]
        no_drop: bool,

        /// Override number of collections dumped and restored in parallel
        #[arg(long)]
        parallel_collections: Option<usize>,
    },

    /// Test database connections
    HealthCheck,

    /// Check connectivity to source, then target
    Preflight,

    /// Show statistics for the configured database
    Stats {
        /// Which endpoint to inspect
        #[arg(long, value_enum, default_value = "source")]
        endpoint: Side,

        /// Override the database name
        #[arg(long)]
        db: Option<String>,
    },

    /// List non-system databases
    ListDatabases {
        /// Which endpoint to inspect
        #[arg(long, value_enum, default_value = "source")]
        endpoint: Side,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.verbosity, &cli.log_format);

    // Fills in tuning values the file leaves unset
    let mut config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            mode,
            source_db,
            target_db,
            databases,
            no_drop,
            parallel_collections,
        } => {
            // Apply overrides
            if let Some(mode) = mode {
                config.migration.mode = mode.into();
            }
            if let Some(db) = source_db {
                config.source.dbname = db;
            }
            if let Some(db) = target_db {
                config.target.dbname = db;
            }
            if !databases.is_empty() {
                config.migration.databases = databases;
            }
            if no_drop {
                config.migration.drop_existing = false;
            }
            if let Some(n) = parallel_collections {
                config.tools.parallel_collections = Some(n);
            }
            config.validate()?;

            // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
            let cancel_token = setup_signal_handler(cli.shutdown_timeout)?;

            let orchestrator = Arc::new(Orchestrator::new(config.tools.clone()));
            let (handle, mut events) = orchestrator.spawn(config.request());
            info!("Started migration attempt {}", handle.attempt_id());

            let finished = tokio::select! {
                _ = forward_events(&mut events, cli.progress) => true,
                _ = cancel_token.cancelled() => false,
            };
            if !finished {
                handle.cancel();
                let timeout = Duration::from_secs(cli.shutdown_timeout);
                if tokio::time::timeout(timeout, forward_events(&mut events, cli.progress))
                    .await
                    .is_err()
                {
                    warn!(
                        "Migration did not stop within {}s, exiting",
                        cli.shutdown_timeout
                    );
                    return Err(MigrateError::Cancelled);
                }
            }

            let result = handle.wait().await;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = if result.success {
                    "Migration completed!"
                } else {
                    "Migration failed!"
                };
                println!("\n{}", status_msg);
                println!("  Attempt ID: {}", result.attempt_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!("  Message: {}", result.message);
            }

            return Ok(ExitCode::from(result.exit_code));
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config.tools.clone());
            let result = orchestrator
                .health_check(&config.source, &config.target)
                .await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.display(),
                    status(result.source_connected, result.source_version.as_deref()),
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    config.target.display(),
                    status(result.target_connected, result.target_version.as_deref()),
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Ok(ExitCode::from(EXIT_CONNECTIVITY_ERROR));
            }
        }

        Commands::Preflight => {
            let orchestrator = Orchestrator::new(config.tools.clone());
            let checks = orchestrator.preflight(&config.source, &config.target).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                for check in &checks {
                    let label = match check.status {
                        CheckStatus::Pass => "PASS",
                        CheckStatus::Fail => "FAIL",
                    };
                    println!("[{}] {}", label, check.message);
                }
            }

            if checks.iter().any(|c| c.status == CheckStatus::Fail) {
                return Ok(ExitCode::from(EXIT_CONNECTIVITY_ERROR));
            }
        }

        Commands::Stats { endpoint, db } => {
            let mut endpoint = select(&config, endpoint);
            if let Some(db) = db {
                endpoint.dbname = db;
            }

            let orchestrator = Orchestrator::new(config.tools.clone());
            let stats = orchestrator.database_stats(&endpoint).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Database Statistics ({}):", endpoint.display());
                println!("  Collections: {}", stats.collections);
                println!("  Documents: {}", stats.objects);
                println!("  Data size: {} bytes", stats.data_size);
                println!("  Storage size: {} bytes", stats.storage_size);
            }
        }

        Commands::ListDatabases { endpoint } => {
            let endpoint = select(&config, endpoint);
            let orchestrator = Orchestrator::new(config.tools.clone());
            let databases = orchestrator.list_databases(&endpoint).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&databases)?);
            } else {
                for name in &databases {
                    println!("{}", name);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn select(config: &Config, side: Side) -> Endpoint {
    match side {
        Side::Source => config.source.clone(),
        Side::Target => config.target.clone(),
    }
}

fn status(connected: bool, version: Option<&str>) -> String {
    match (connected, version) {
        (true, Some(version)) => format!("OK, MongoDB {}", version),
        (true, None) => "OK".to_string(),
        (false, _) => "FAILED".to_string(),
    }
}

/// Print attempt events until the attempt ends and its sender is dropped.
async fn forward_events(events: &mut mpsc::UnboundedReceiver<LogEvent>, progress: bool) {
    while let Some(event) = events.recv().await {
        if progress {
            match serde_json::to_string(&event) {
                Ok(json) => eprintln!("{}", json),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        } else {
            eprintln!("{}", event);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    // RUST_LOG wins over --verbosity when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (container shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!(
            "\nReceived {}. Shutting down gracefully (timeout: {}s)...",
            name, shutdown_timeout
        );
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\nReceived Ctrl-C. Shutting down gracefully (timeout: {}s)...",
                shutdown_timeout
            );
            token.cancel();
        }
    });

    Ok(cancel_token)
}
