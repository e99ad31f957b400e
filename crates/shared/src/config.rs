//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Ledger policy configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Scheduled balance health check configuration.
    #[serde(default)]
    pub health: HealthCheckConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Ledger policy: posting window, closing target, retry budget.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Account code that receives net income when a period is closed.
    #[serde(default = "default_retained_earnings_code")]
    pub retained_earnings_code: String,
    /// Postings dated more than this many years before today are rejected.
    #[serde(default = "default_max_past_years")]
    pub max_past_years: u32,
    /// Postings dated more than this many days after today are rejected.
    #[serde(default = "default_max_future_days")]
    pub max_future_days: u32,
    /// Attempts made on serialization conflicts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound for a single period close, in seconds.
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retained_earnings_code: default_retained_earnings_code(),
            max_past_years: default_max_past_years(),
            max_future_days: default_max_future_days(),
            max_retries: default_max_retries(),
            close_timeout_secs: default_close_timeout(),
        }
    }
}

fn default_retained_earnings_code() -> String {
    "3201".to_string()
}

fn default_max_past_years() -> u32 {
    2
}

fn default_max_future_days() -> u32 {
    7
}

fn default_max_retries() -> u32 {
    3
}

fn default_close_timeout() -> u64 {
    60
}

/// Scheduled balance health check.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    /// Whether the background job runs at all.
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Seconds between runs.
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    /// Run the safe auto-heal after each check that finds drift.
    #[serde(default)]
    pub auto_heal: bool,
    /// Upper bound for one run, in seconds.
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
    /// Subledger discrepancy count above which status becomes ERROR.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            interval_secs: default_health_interval(),
            auto_heal: false,
            timeout_secs: default_health_timeout(),
            alert_threshold: default_alert_threshold(),
        }
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_interval() -> u64 {
    1800 // 30 minutes
}

fn default_health_timeout() -> u64 {
    600 // 10 minutes
}

fn default_alert_threshold() -> usize {
    3
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
