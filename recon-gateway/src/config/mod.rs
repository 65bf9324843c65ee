//! Configuration module for recon-gateway.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Upper bound on an inbound multipart body, both files included.
    pub max_upload_bytes: usize,
    pub reconciliation_service: ReconciliationServiceConfig,
}

/// Where and how to reach the downstream reconciliation service.
#[derive(Debug, Clone)]
pub struct ReconciliationServiceConfig {
    /// Base URL without a trailing slash, e.g. `http://recon-api:8000/api/v1`.
    pub url: String,
    pub connect_timeout: Duration,
}

impl ReconciliationServiceConfig {
    pub fn new(url: &str) -> Result<Self, AppError> {
        Ok(Self {
            url: normalize_base_url(url)?,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let url = env::var("RECONCILIATION_SERVICE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("RECONCILIATION_SERVICE_URL is required"))
        })?;
        let mut reconciliation_service = ReconciliationServiceConfig::new(&url)?;
        if let Some(secs) = parse_var::<u64>("RECONCILIATION_SERVICE_CONNECT_TIMEOUT_SECS")? {
            reconciliation_service.connect_timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "recon-gateway".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            reconciliation_service,
        })
    }

    /// Config pointing at `base_url` with defaults for everything else.
    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            common: core_config::Config::default(),
            service_name: "recon-gateway".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            reconciliation_service: ReconciliationServiceConfig::new(base_url)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {:?}", name, raw))
        }),
        Err(_) => Ok(None),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, AppError> {
    let url = raw.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "RECONCILIATION_SERVICE_URL must be an http(s) URL, got {:?}",
            raw
        )));
    }
    Ok(url.to_string())
}
