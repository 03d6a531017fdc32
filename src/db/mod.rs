//! Pool setup, embedded migrations and the storage side of readiness.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::models::QueueBacklog;
use crate::queue::PgJobQueue;

pub type DbPool = PgPool;

/// Shown in `pg_stat_activity` for every pooled connection
const APPLICATION_NAME: &str = "treso-alerts";

/// Opens the pool; every session runs in UTC so date windows and job
/// schedules agree with the scanners
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(&config.url)?
        .application_name(APPLICATION_NAME)
        .options([("timezone", "UTC")]);
    let target = format!(
        "{}/{}",
        options.get_host(),
        options.get_database().unwrap_or("postgres")
    );

    log::info!("Connecting to {}...", target);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect_with(options)
        .await?;

    log::info!(
        "Pool ready on {} (max: {}, min: {})",
        target,
        config.max_connections,
        config.min_connections
    );

    Ok(pool)
}

/// Applies the engine-owned schema; host tables are never touched
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    log::info!("Applying up to {} migration(s)...", migrator.iter().count());

    migrator.run(pool).await?;

    log::info!("Schema up to date");
    Ok(())
}

/// Storage as seen by the readiness probe
#[derive(Debug, Clone, PartialEq)]
pub struct StorageStatus {
    pub database: bool,
    /// `None` when the job table cannot be read, e.g. before migrations ran
    pub alert_jobs: Option<QueueBacklog>,
}

impl StorageStatus {
    /// Ready once the database answers and the job queue is readable
    pub fn is_ready(&self) -> bool {
        self.database && self.alert_jobs.is_some()
    }

    pub fn database_label(&self) -> &'static str {
        if self.database {
            "ok"
        } else {
            "error"
        }
    }

    pub fn queue_label(&self) -> &'static str {
        match (self.database, &self.alert_jobs) {
            (_, Some(_)) => "ok",
            (false, None) => "unknown",
            (true, None) => "error",
        }
    }
}

/// Pings the database, then reads the alert job backlog
pub async fn storage_status(pool: &DbPool) -> StorageStatus {
    if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
        log::warn!("Database unreachable: {}", e);
        return StorageStatus {
            database: false,
            alert_jobs: None,
        };
    }

    let alert_jobs = match PgJobQueue::new(pool.clone()).backlog().await {
        Ok(backlog) => Some(backlog),
        Err(e) => {
            log::warn!("Could not read alert job backlog: {}", e);
            None
        }
    };

    StorageStatus {
        database: true,
        alert_jobs,
    }
}
