use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub scanner: ScannerConfig,
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

/// Queue worker and dispatch tuning
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of jobs processed in parallel
    pub concurrency: usize,
    /// Delay between two claims when the queue is empty
    pub poll_interval: Duration,
    /// Retries after the first attempt (total attempts = 1 + retry_attempts)
    pub retry_attempts: u32,
    /// First retry delay; doubled on every subsequent retry
    pub backoff_base: Duration,
    /// How long a claimed job stays invisible to other workers
    pub lease: Duration,
    /// Upper bound for a single channel send
    pub send_timeout: Duration,
    /// Upper bound for an asynchronous enqueue from the dispatcher
    pub enqueue_timeout: Duration,
}

/// Periodic scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Default treasury threshold when a market has none of its own
    pub treasury_threshold: f64,
    pub deadline_horizon_days: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            database: DatabaseConfig::from_env()?,
            worker: WorkerConfig::from_env(),
            scanner: ScannerConfig::from_env(),
        })
    }
}

/// Reads an environment variable, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Load database configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        Ok(Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1),
            acquire_timeout: Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)),
            idle_timeout: Duration::from_secs(env_or("DATABASE_IDLE_TIMEOUT_SECS", 600)),
            max_lifetime: Duration::from_secs(env_or("DATABASE_MAX_LIFETIME_SECS", 1800)),
        })
    }
}

impl WorkerConfig {
    /// Load worker configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            concurrency: env_or("WORKER_CONCURRENCY", defaults.concurrency).max(1),
            poll_interval: Duration::from_millis(env_or("WORKER_POLL_INTERVAL_MS", 1000)),
            retry_attempts: env_or("JOB_RETRY_ATTEMPTS", defaults.retry_attempts),
            backoff_base: Duration::from_millis(env_or("JOB_BACKOFF_BASE_MS", 1000)),
            lease: Duration::from_secs(env_or("JOB_LEASE_SECS", 300)),
            send_timeout: Duration::from_secs(env_or("SEND_TIMEOUT_SECS", 30)),
            enqueue_timeout: Duration::from_millis(env_or("ENQUEUE_TIMEOUT_MS", 2000)),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_secs(1),
            retry_attempts: 2,
            backoff_base: Duration::from_secs(1),
            lease: Duration::from_secs(300),
            send_timeout: Duration::from_secs(30),
            enqueue_timeout: Duration::from_secs(2),
        }
    }
}

/// Ten years; longer horizons are clamped
pub const MAX_DEADLINE_HORIZON_DAYS: i64 = 3650;

impl ScannerConfig {
    /// Load scanner configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env::var("SCANNERS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.enabled),
            interval: Duration::from_secs(env_or("SCANNER_INTERVAL_SECS", 3600).max(1)),
            treasury_threshold: env_or("TREASURY_THRESHOLD", defaults.treasury_threshold),
            deadline_horizon_days: env_or("DEADLINE_HORIZON_DAYS", defaults.deadline_horizon_days)
                .clamp(0, MAX_DEADLINE_HORIZON_DAYS),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3600),
            treasury_threshold: 10_000.0,
            deadline_horizon_days: 30,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "PORT must be a valid number"),
            ConfigError::MissingDatabaseUrl => {
                write!(f, "DATABASE_URL environment variable is required")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
