// src/main.rs
use cartola_fetcher::api::{HttpCartolaApi, create_http_client_with_timeout};
use cartola_fetcher::cli::Args;
use cartola_fetcher::config::Config;
use cartola_fetcher::credentials::bootstrap::{bootstrap_credential, tokens_from_env};
use cartola_fetcher::credentials::{CredentialManager, HttpTokenRefresher};
use cartola_fetcher::error::AppError;
use cartola_fetcher::logging::setup_logging;
use cartola_fetcher::shutdown::install_signal_handler;
use cartola_fetcher::storage::{self, DbPool, SqliteCredentialStore, SqliteSyncStore};
use cartola_fetcher::sync::{
    CycleOutcome, CycleSettings, FetchCycle, RateLimiter, RetryPolicy, Scheduler,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Handle configuration listing before logging touches the filesystem
    if args.list_config {
        return Config::display().await;
    }

    let (log_file_path, _guard) = setup_logging(&args).await?;
    info!("Logs are written to: {log_file_path}");

    let mut config = Config::load().await?;
    args.apply_overrides(&mut config);
    config.validate()?;

    if args.write_config {
        config.save().await?;
        println!("Config saved to {}", Config::get_config_path());
        return Ok(());
    }

    let pool = storage::init_pool(&config.database_url).await?;

    if args.bootstrap_credential {
        let store = SqliteCredentialStore::new(pool.clone());
        let tokens = tokens_from_env().await?;
        bootstrap_credential(&store, &config.env_key, tokens).await?;
        pool.close().await;
        return Ok(());
    }

    let scheduler = Arc::new(build_scheduler(&config, &pool)?);

    let result = if args.once {
        run_single_cycle(&scheduler, args.status_json).await
    } else {
        run_service(&scheduler, config.fetch_interval_minutes).await
    };

    pool.close().await;
    result
}

fn build_scheduler(config: &Config, pool: &DbPool) -> Result<Scheduler, AppError> {
    let client = create_http_client_with_timeout(config.http_timeout_seconds)?;

    let credentials = CredentialManager::new(
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        Arc::new(HttpTokenRefresher::new(client.clone(), config)),
    );

    let cycle = FetchCycle::new(
        Arc::new(HttpCartolaApi::new(client, config)),
        Arc::new(SqliteSyncStore::new(pool.clone())),
        Arc::new(credentials),
        Arc::new(RateLimiter::from_config(config)),
        RetryPolicy::from_config(config),
        CycleSettings::from_config(config),
    );

    Ok(Scheduler::new(Arc::new(cycle)))
}

async fn run_single_cycle(scheduler: &Scheduler, status_json: bool) -> Result<(), AppError> {
    let shutdown = install_signal_handler();
    let report = scheduler.run_once(&shutdown).await;

    if status_json {
        let status = scheduler.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    // A failed cycle surfaces as an error so the process exits with status 1
    if report.outcome == CycleOutcome::Error {
        let reason = report
            .error
            .unwrap_or_else(|| "unknown error".to_string());
        error!("Cycle failed: {reason}");
        return Err(AppError::fatal_precondition(reason));
    }
    Ok(())
}

async fn run_service(scheduler: &Arc<Scheduler>, interval_minutes: u64) -> Result<(), AppError> {
    let shutdown = install_signal_handler();

    let stopper = {
        let scheduler = Arc::clone(scheduler);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            scheduler.stop().await;
        })
    };

    scheduler
        .start(Duration::from_secs(interval_minutes.saturating_mul(60)))
        .await?;

    if let Err(e) = stopper.await {
        error!("Shutdown task failed: {e}");
    }
    info!("Fetcher shut down cleanly");
    Ok(())
}
