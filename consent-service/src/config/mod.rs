use crate::models::ScaApproach;
use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub profile: AspspProfile,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Config {
    /// Load from an optional `configuration` file and `APP__*` variables.
    pub fn load() -> Result<Self, AppError> {
        service_core::config::load("configuration", "APP")
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
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

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

/// Where the ASPSP connector (the SPI implementation) is reachable.
#[derive(Deserialize, Clone, Debug)]
pub struct ConnectorConfig {
    #[serde(default = "default_connector_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: Secret<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_connector_url(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// ASPSP capabilities the gateway enforces.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AspspProfile {
    /// Supported approaches; the first one is the default.
    pub sca_approaches: Vec<ScaApproach>,
    pub authorisation_confirmation_request_mandated: bool,
    pub all_psd2_supported: bool,
    pub available_accounts_consent_supported: bool,
    pub bank_offered_consent_supported: bool,
    pub combined_service_indicator_supported: bool,
    pub psu_in_initial_request_mandated: bool,
    pub account_owner_information_supported: bool,
    pub sca_by_one_time_available_accounts_consent_required: bool,
    pub ais_redirect_url_to_aspsp: String,
}

impl AspspProfile {
    pub fn default_sca_approach(&self) -> ScaApproach {
        self.sca_approaches
            .first()
            .copied()
            .unwrap_or(ScaApproach::Redirect)
    }
}

impl Default for AspspProfile {
    fn default() -> Self {
        Self {
            sca_approaches: vec![ScaApproach::Redirect],
            authorisation_confirmation_request_mandated: false,
            all_psd2_supported: true,
            available_accounts_consent_supported: true,
            bank_offered_consent_supported: true,
            combined_service_indicator_supported: false,
            psu_in_initial_request_mandated: false,
            account_owner_information_supported: false,
            sca_by_one_time_available_accounts_consent_required: false,
            ais_redirect_url_to_aspsp:
                "http://localhost:4200/ais/{redirect-id}/{encrypted-consent-id}?inr={inr-id}"
                    .to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

/// Accounts known to the ASPSP. When unset, every reference is accepted.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct AccountsConfig {
    #[serde(default)]
    pub known_ibans: Option<Vec<String>>,
}

fn default_service_name() -> String {
    "consent-service".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3010
}

fn default_db_name() -> String {
    "consent_db".to_string()
}

fn default_connector_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_api_key() -> Secret<String> {
    Secret::new(String::new())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info,consent_service=debug".to_string()
}
