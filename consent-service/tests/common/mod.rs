#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use consent_service::config::{
    AccountsConfig, AspspProfile, Config, ConnectorConfig, ObservabilityConfig, ServerConfig,
};
use consent_service::models::{
    AccountAccess, AccountReference, CreateConsentRequest, CreateConsentResponse,
    MessageErrorCode, PsuIdData, TppInfo, TppMessageInformation,
};
use consent_service::services::store::{
    InMemoryAspspConsentDataRepository, InMemoryConsentRepository,
};
use consent_service::services::{ConsentService, InMemoryAccountCatalog, InMemoryEventService};
use consent_service::spi::{
    AisConsentSpi, SpiAccountConsent, SpiAspspConsentDataProvider,
    SpiAuthorisationDecoupledScaResponse, SpiAuthorisationStatus, SpiAuthorizationCodeResult,
    SpiAvailableScaMethodsResponse, SpiConfirmationCodeCheckResponse, SpiConsentStatusResponse,
    SpiContextData, SpiError, SpiInitiateAisConsentResponse, SpiPsuAuthorisationResponse,
    SpiResult,
};
use consent_service::startup::Application;
use consent_service::RequestContext;
use secrecy::Secret;
use std::sync::{Arc, Mutex};

pub const TPP_ID: &str = "PSDDE-FAKENCA-87B2AC";
pub const OTHER_TPP_ID: &str = "PSDDE-FAKENCA-11AA00";
pub const KNOWN_IBAN: &str = "DE89370400440532013000";
pub const UNKNOWN_IBAN: &str = "GB82WEST12345698765432";
pub const PSU_ID: &str = "psu-anton";

pub fn spi_error(code: MessageErrorCode) -> SpiError {
    SpiError::new(TppMessageInformation::of(code))
}

/// SPI double with one scripted answer per operation.
///
/// Every successful call writes the operation name into the bank context so
/// tests can see what was persisted.
pub struct ScriptedSpi {
    pub initiate: Mutex<SpiResult<SpiInitiateAisConsentResponse>>,
    pub status: Mutex<SpiResult<SpiConsentStatusResponse>>,
    pub revoke: Mutex<SpiResult<()>>,
    pub authorise: Mutex<SpiResult<SpiPsuAuthorisationResponse>>,
    pub methods: Mutex<SpiResult<SpiAvailableScaMethodsResponse>>,
    pub code: Mutex<SpiResult<SpiAuthorizationCodeResult>>,
    pub decoupled: Mutex<SpiResult<SpiAuthorisationDecoupledScaResponse>>,
    pub verify: Mutex<SpiResult<()>>,
    pub confirmation: Mutex<SpiResult<SpiConfirmationCodeCheckResponse>>,
    calls: Mutex<Vec<&'static str>>,
    revoked_by: Mutex<Option<PsuIdData>>,
}

impl Default for ScriptedSpi {
    fn default() -> Self {
        Self {
            initiate: Mutex::new(Ok(SpiInitiateAisConsentResponse::default())),
            status: Mutex::new(Ok(SpiConsentStatusResponse {
                consent_status: consent_service::models::ConsentStatus::Received,
                psu_message: None,
            })),
            revoke: Mutex::new(Ok(())),
            authorise: Mutex::new(Ok(SpiPsuAuthorisationResponse {
                status: SpiAuthorisationStatus::Success,
                sca_exempted: false,
            })),
            methods: Mutex::new(Ok(SpiAvailableScaMethodsResponse::default())),
            code: Mutex::new(Ok(SpiAuthorizationCodeResult::default())),
            decoupled: Mutex::new(Ok(SpiAuthorisationDecoupledScaResponse::default())),
            verify: Mutex::new(Ok(())),
            confirmation: Mutex::new(Ok(SpiConfirmationCodeCheckResponse { code_valid: true })),
            calls: Mutex::new(Vec::new()),
            revoked_by: Mutex::new(None),
        }
    }
}

impl ScriptedSpi {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| **c == operation).count()
    }

    /// PSU carried in the SPI context of the last revoke call.
    pub fn revoked_by(&self) -> Option<PsuIdData> {
        self.revoked_by.lock().unwrap().clone()
    }

    fn answer<T: Clone>(
        &self,
        operation: &'static str,
        script: &Mutex<SpiResult<T>>,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<T> {
        self.calls.lock().unwrap().push(operation);
        let result = script.lock().unwrap().clone();
        if result.is_ok() {
            provider.update_aspsp_consent_data(operation.as_bytes().to_vec());
        }
        result
    }
}

#[async_trait]
impl AisConsentSpi for ScriptedSpi {
    async fn initiate_ais_consent(
        &self,
        _ctx: &SpiContextData,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiInitiateAisConsentResponse> {
        self.answer("initiate", &self.initiate, provider)
    }

    async fn get_consent_status(
        &self,
        _ctx: &SpiContextData,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConsentStatusResponse> {
        self.answer("status", &self.status, provider)
    }

    async fn revoke_ais_consent(
        &self,
        ctx: &SpiContextData,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()> {
        *self.revoked_by.lock().unwrap() = Some(ctx.psu_data.clone());
        self.answer("revoke", &self.revoke, provider)
    }

    async fn authorise_psu(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _password: &Secret<String>,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiPsuAuthorisationResponse> {
        self.answer("authorise", &self.authorise, provider)
    }

    async fn request_available_sca_methods(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAvailableScaMethodsResponse> {
        self.answer("methods", &self.methods, provider)
    }

    async fn request_authorisation_code(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _authentication_method_id: &str,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorizationCodeResult> {
        self.answer("code", &self.code, provider)
    }

    async fn start_sca_decoupled(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _authentication_method_id: Option<&str>,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorisationDecoupledScaResponse> {
        self.answer("decoupled", &self.decoupled, provider)
    }

    async fn verify_sca_authorisation(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _sca_authentication_data: &str,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()> {
        self.answer("verify", &self.verify, provider)
    }

    async fn check_confirmation_code(
        &self,
        _ctx: &SpiContextData,
        _authorisation_id: &str,
        _confirmation_code: &str,
        _consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConfirmationCodeCheckResponse> {
        self.answer("confirmation", &self.confirmation, provider)
    }
}

/// Consent service wired to in-memory collaborators.
pub struct TestHarness {
    pub service: ConsentService,
    pub repository: Arc<InMemoryConsentRepository>,
    pub consent_data: Arc<InMemoryAspspConsentDataRepository>,
    pub events: Arc<InMemoryEventService>,
    pub spi: Arc<ScriptedSpi>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_profile(AspspProfile::default())
    }

    pub fn with_profile(profile: AspspProfile) -> Self {
        let repository = Arc::new(InMemoryConsentRepository::new());
        let consent_data = Arc::new(InMemoryAspspConsentDataRepository::new());
        let events = Arc::new(InMemoryEventService::new());
        let spi = Arc::new(ScriptedSpi::default());

        let service = ConsentService::new(
            Arc::new(profile),
            repository.clone(),
            consent_data.clone(),
            spi.clone(),
            Arc::new(InMemoryAccountCatalog::with_ibans([KNOWN_IBAN])),
            events.clone(),
        );

        Self {
            service,
            repository,
            consent_data,
            events,
            spi,
        }
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(TppInfo::new(TPP_ID)).with_x_request_id("req-1")
    }

    pub fn other_tpp_ctx(&self) -> RequestContext {
        RequestContext::new(TppInfo::new(OTHER_TPP_ID))
    }

    /// Create a consent for all accounts, optionally starting its authorisation.
    pub async fn create_consent(&self, explicit_preferred: bool) -> CreateConsentResponse {
        let mut ctx = self.ctx();
        self.service
            .create_consent(
                &mut ctx,
                all_accounts_request(),
                &PsuIdData::new(PSU_ID),
                explicit_preferred,
            )
            .await
            .expect("consent creation failed")
    }
}

pub fn profile_with(approach: consent_service::models::ScaApproach) -> AspspProfile {
    AspspProfile {
        sca_approaches: vec![approach],
        ..AspspProfile::default()
    }
}

pub fn all_accounts_request() -> CreateConsentRequest {
    CreateConsentRequest {
        access: AccountAccess::all_accounts(),
        recurring_indicator: true,
        valid_until: Utc::now().date_naive() + Duration::days(90),
        frequency_per_day: 4,
        combined_service_indicator: false,
    }
}

pub fn dedicated_request(iban: &str) -> CreateConsentRequest {
    CreateConsentRequest {
        access: AccountAccess {
            accounts: vec![AccountReference::iban(iban).with_currency("EUR")],
            ..AccountAccess::default()
        },
        ..all_accounts_request()
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
        },
        database: None,
        connector: ConnectorConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: Secret::new("test-key".to_string()),
            timeout_secs: 1,
        },
        profile: AspspProfile::default(),
        observability: ObservabilityConfig::default(),
        accounts: AccountsConfig::default(),
        service_name: "consent-service-test".to_string(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let app = Application::build(test_config())
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}
