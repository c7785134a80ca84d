//! Selective log store cleanup worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use logstore_application::{CLEANUP_TASK_NAME, CleanupOptions, CleanupSweeper, SystemClock};
use logstore_core::{AppError, AppResult};
use logstore_infrastructure::{MIGRATOR, PostgresLogStoreRepository, PostgresSettingsRepository};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    interval_seconds: u64,
    time_budget_seconds: u64,
    run_once: bool,
    run_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    if config.run_migrations {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
    }

    let sweeper = build_sweeper(pool, &config);

    info!(
        task = CLEANUP_TASK_NAME,
        interval_seconds = config.interval_seconds,
        time_budget_seconds = config.time_budget_seconds,
        run_once = config.run_once,
        "logstore-worker started"
    );

    loop {
        match sweeper.execute().await {
            Ok(report) => {
                info!(
                    task = CLEANUP_TASK_NAME,
                    deleted_rows = report.deleted_rows,
                    budget_exhausted = report.budget_exhausted,
                    "{report}"
                );
            }
            Err(error) => {
                warn!(
                    task = CLEANUP_TASK_NAME,
                    error = %error,
                    retryable = error.is_retryable(),
                    "log cleanup failed"
                );
            }
        }

        if config.run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_sweeper(pool: PgPool, config: &WorkerConfig) -> CleanupSweeper {
    CleanupSweeper::new(
        Arc::new(PostgresLogStoreRepository::new(pool.clone())),
        Arc::new(PostgresSettingsRepository::new(pool)),
        Arc::new(SystemClock),
        CleanupOptions {
            time_budget: Duration::from_secs(config.time_budget_seconds),
            ..CleanupOptions::default()
        },
    )
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let interval_seconds = parse_env_u64("LOGSTORE_CLEANUP_INTERVAL_SECONDS", 3_600)?;
        let time_budget_seconds = parse_env_u64("LOGSTORE_CLEANUP_TIME_BUDGET_SECONDS", 600)?;
        let run_once = parse_env_bool("LOGSTORE_CLEANUP_RUN_ONCE", false)?;
        let run_migrations = parse_env_bool("LOGSTORE_RUN_MIGRATIONS", true)?;

        if interval_seconds == 0 {
            return Err(AppError::Validation(
                "LOGSTORE_CLEANUP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if time_budget_seconds == 0 {
            return Err(AppError::Validation(
                "LOGSTORE_CLEANUP_TIME_BUDGET_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            interval_seconds,
            time_budget_seconds,
            run_once,
            run_migrations,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => parse_bool(value.trim())
            .ok_or_else(|| AppError::Validation(format!("invalid {name} value '{value}'"))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
