//! Settings: TOML defaults layered under environment overrides.
//!
//! The deployment platform still exports the historical flat variable
//! names (`MONGODB_URI`, `CALLBACK_BASE_URL`, ...); those win over both
//! the file and the `SANALPOS__`-prefixed structured overrides.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub payment: Payment,
    pub outbound: Outbound,
    pub log: Log,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Database {
    pub uri: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Payment {
    /// Base URL the issuer redirects and callbacks run against.
    pub callback_base_url: String,
    /// BIN lookup upstream.
    pub bin_api_url: String,
    /// Master secret for field-level encryption.
    pub master_key: String,
    /// Origin allowed by the upstream gateway; propagated for logs only.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Outbound {
    pub request_timeout_secs: u64,
    pub bin_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Settings {
    pub fn new() -> Result<Self, ApplicationError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")
            .and_then(|b| b.set_default("server.port", 7043_i64))
            .and_then(|b| b.set_default("database.uri", "mongodb://localhost:27017/sanalpos"))
            .and_then(|b| b.set_default("payment.callback_base_url", ""))
            .and_then(|b| b.set_default("payment.bin_api_url", ""))
            .and_then(|b| b.set_default("payment.master_key", ""))
            .and_then(|b| b.set_default("outbound.request_timeout_secs", 30_i64))
            .and_then(|b| b.set_default("outbound.bin_timeout_secs", 5_i64))
            .and_then(|b| b.set_default("log.level", "info"))
            .map_err(|e| ApplicationError::InvalidConfiguration(e.to_string()))?
            .add_source(config::File::with_name("config/development").required(false))
            .add_source(config::Environment::with_prefix("SANALPOS").separator("__"));

        for (variable, key) in [
            ("MONGODB_URI", "database.uri"),
            ("CALLBACK_BASE_URL", "payment.callback_base_url"),
            ("BIN_API_URL", "payment.bin_api_url"),
            ("ENCRYPTION_KEY", "payment.master_key"),
            ("CORS_ORIGIN", "payment.cors_origin"),
            ("PORT", "server.port"),
        ] {
            if let Ok(value) = std::env::var(variable) {
                builder = builder
                    .set_override(key, value)
                    .map_err(|e| ApplicationError::InvalidConfiguration(e.to_string()))?;
            }
        }

        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ApplicationError::InvalidConfiguration(e.to_string()))
    }

    /// Refuse to start without the knobs the payment flow cannot run
    /// without.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.payment.master_key.is_empty() {
            return Err(ApplicationError::InvalidConfiguration(
                "payment.master_key (ENCRYPTION_KEY) must be set".to_string(),
            ));
        }
        if self.payment.callback_base_url.is_empty() {
            return Err(ApplicationError::InvalidConfiguration(
                "payment.callback_base_url (CALLBACK_BASE_URL) must be set".to_string(),
            ));
        }
        if self.database.uri.is_empty() {
            return Err(ApplicationError::InvalidConfiguration(
                "database.uri (MONGODB_URI) must be set".to_string(),
            ));
        }
        Ok(())
    }
}
