use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Sandbox STK push shortcode published by Safaricom for testing.
const DEFAULT_SHORTCODE: &str = "174379";

/// Daraja (M-Pesa) gateway configuration, injected into the gateway client at
/// construction rather than read from ambient environment state.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MpesaConfig {
    /// "sandbox" or "production"; selects the Daraja base URL
    #[serde(default = "default_mpesa_environment")]
    pub environment: String,

    /// OAuth client credentials for the Daraja app
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,

    /// Fallback BusinessShortCode used when an event carries no payment number
    #[serde(default = "default_shortcode")]
    pub shortcode: String,

    /// STK push passkey (required for live pushes)
    #[serde(default)]
    pub passkey: String,

    /// Publicly reachable URL Daraja delivers callbacks to
    #[serde(default)]
    pub callback_url: String,

    /// Optional global override for the transaction type; when unset the
    /// event's payment method decides (TILL vs PAYBILL)
    #[serde(default)]
    pub transaction_type: Option<String>,

    /// Optional global override for PartyB; defaults to the shortcode in use
    #[serde(default)]
    pub party_b: Option<String>,
}

impl MpesaConfig {
    pub fn base_url(&self) -> &'static str {
        if self.environment.eq_ignore_ascii_case("production") {
            "https://api.safaricom.co.ke"
        } else {
            "https://sandbox.safaricom.co.ke"
        }
    }
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            environment: default_mpesa_environment(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: default_shortcode(),
            passkey: String::new(),
            callback_url: String::new(),
            transaction_type: None,
            party_b: None,
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Bind host and port
    pub host: String,
    pub port: u16,

    /// Runtime environment name ("development", "production", ...)
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Run migrations at startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// Comma-separated list of allowed CORS origins; permissive when unset
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Brand label used in STK push transaction descriptions
    #[serde(default = "default_brand_name")]
    pub brand_name: String,

    #[serde(default)]
    #[validate]
    pub mpesa: MpesaConfig,
}

impl AppConfig {
    /// Constructor used by tests and tooling; production code goes through
    /// [`load_config`].
    pub fn new(database_url: &str, host: &str, port: u16, environment: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            host: host.to_string(),
            port,
            environment: environment.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            brand_name: default_brand_name(),
            mpesa: MpesaConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }
}

fn default_mpesa_environment() -> String {
    "sandbox".to_string()
}

fn default_shortcode() -> String {
    DEFAULT_SHORTCODE.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_brand_name() -> String {
    "Tikiti".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration load error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("tikiti_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*, nested keys separated with `__`,
///    e.g. APP__MPESA__PASSKEY)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://tikiti.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
