use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use hourglass::{
    config::{self, HourglassConfig},
    db::DbPool,
    observability,
    platform::DiscordClient,
    retention::{RetentionScheduler, clock::SystemClock, start_retention_worker},
};
use tokio_util::sync::CancellationToken;

/// How long to wait for an in-flight pass after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(version, about = "Discord per-channel message retention", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "hourglass.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the retention worker (default)
    Run,
    /// Run database migrations and exit
    Migrate,
    /// Initialize a new configuration file
    Init {
        /// Output path (defaults to the --config path)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => {
            run_init(output.unwrap_or(args.config), force);
        }
        Some(Command::Migrate) => {
            run_migrate(&args.config).await;
        }
        Some(Command::Run) | None => {
            run_daemon(&args.config).await;
        }
    }
}

fn load_config(path: &Path) -> HourglassConfig {
    match HourglassConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Write the default configuration file.
fn run_init(output_path: PathBuf, force: bool) {
    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    if let Err(e) = std::fs::write(&output_path, config::default_config_toml()) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("Set DISCORD_BOT_TOKEN, then run:");
    println!("  hourglass --config {} run", output_path.display());
}

/// Apply migrations and exit.
async fn run_migrate(config_path: &Path) {
    let config = load_config(config_path);

    let bounds = config.retention.timeout_bounds();
    let db = match DbPool::from_config(&config.database, bounds).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db.run_migrations().await {
        eprintln!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    println!("Migrations applied to {}", config.database.path);
    db.close().await;
}

async fn run_daemon(config_path: &Path) {
    let config = load_config(config_path);

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    tracing::info!(config = %config_path.display(), "Starting hourglass");

    let bounds = config.retention.timeout_bounds();
    let db = match DbPool::from_config(&config.database, bounds).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(path = %config.database.path, error = %e, "Failed to open database");
            std::process::exit(1);
        }
    };

    if config.database.run_migrations
        && let Err(e) = db.run_migrations().await
    {
        tracing::error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    }

    match db.policies().list_all().await {
        Ok(channels) => tracing::info!(channels = channels.len(), "Loaded tracked channels"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read tracked channels");
            std::process::exit(1);
        }
    }

    let platform = match DiscordClient::new(&config.discord) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build Discord client");
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(RetentionScheduler::new(
        db.policies(),
        platform,
        Arc::new(SystemClock),
        config.retention.clone(),
    ));

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(start_retention_worker(scheduler, shutdown.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, waiting for the current pass to finish...");
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, worker).await {
        Ok(Ok(())) => tracing::info!("Retention worker finished"),
        Ok(Err(e)) => tracing::error!(error = %e, "Retention worker panicked"),
        Err(_) => tracing::warn!("Timeout waiting for retention worker, exiting anyway"),
    }

    db.close().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
