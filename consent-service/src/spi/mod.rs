//! Bank-integration boundary.
//!
//! The gateway talks to the ASPSP only through [`AisConsentSpi`]. Every call
//! carries a provider for the opaque per-consent bank context; whatever the
//! SPI writes there is persisted by the caller once the call has succeeded.

pub mod connector;
pub mod data_provider;

use crate::context::RequestContext;
use crate::models::{
    AccountAccess, AisConsent, AuthenticationObject, ChallengeData, ConsentStatus, PsuIdData,
    TppMessageInformation,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use connector::AspspConnectorClient;
pub use data_provider::{
    BoundSpiAspspConsentDataProvider, ConsentDataError, InitialSpiAspspConsentDataProvider,
    SpiAspspConsentDataProvider, SpiAspspConsentDataProviderFactory,
};

/// Failure reported by the bank boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SPI error: {tpp_messages:?}")]
pub struct SpiError {
    pub tpp_messages: Vec<TppMessageInformation>,
}

impl SpiError {
    pub fn new(tpp_message: TppMessageInformation) -> Self {
        Self {
            tpp_messages: vec![tpp_message],
        }
    }
}

pub type SpiResult<T> = Result<T, SpiError>;

/// Caller identity handed to the SPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiContextData {
    pub psu_data: PsuIdData,
    pub tpp_authorisation_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_request_id: Option<String>,
    pub internal_request_id: Uuid,
}

/// Builds [`SpiContextData`] from the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiContextDataProvider;

impl SpiContextDataProvider {
    pub fn provide(&self, psu: &PsuIdData, ctx: &RequestContext) -> SpiContextData {
        SpiContextData {
            psu_data: psu.clone(),
            tpp_authorisation_number: ctx.tpp.authorisation_number.clone(),
            x_request_id: ctx.x_request_id.clone(),
            internal_request_id: ctx.internal_request_id,
        }
    }

    /// Context without a PSU, for calls the TPP makes on its own.
    pub fn provide_ambient(&self, ctx: &RequestContext) -> SpiContextData {
        self.provide(&PsuIdData::default(), ctx)
    }
}

/// Consent as the bank boundary sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiAccountConsent {
    pub id: String,
    pub status: ConsentStatus,
    pub access: AccountAccess,
    pub recurring_indicator: bool,
    pub valid_until: NaiveDate,
    pub frequency_per_day: u32,
    pub combined_service_indicator: bool,
    pub psu_data: Vec<PsuIdData>,
    pub tpp_authorisation_number: String,
}

impl From<&AisConsent> for SpiAccountConsent {
    fn from(consent: &AisConsent) -> Self {
        Self {
            id: consent.id.clone(),
            status: consent.status,
            access: consent.tpp_access.clone(),
            recurring_indicator: consent.recurring_indicator,
            valid_until: consent.valid_until,
            frequency_per_day: consent.frequency_per_day,
            combined_service_indicator: consent.combined_service_indicator,
            psu_data: consent.psu_data.clone(),
            tpp_authorisation_number: consent.tpp.authorisation_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpiInitiateAisConsentResponse {
    #[serde(default)]
    pub account_access: AccountAccess,
    #[serde(default)]
    pub multilevel_sca_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiConsentStatusResponse {
    pub consent_status: ConsentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpiAuthorisationStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiPsuAuthorisationResponse {
    pub status: SpiAuthorisationStatus,
    #[serde(default)]
    pub sca_exempted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpiAvailableScaMethodsResponse {
    #[serde(default)]
    pub available_sca_methods: Vec<AuthenticationObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpiAuthorizationCodeResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_sca_method: Option<AuthenticationObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_data: Option<ChallengeData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpiAuthorisationDecoupledScaResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiConfirmationCodeCheckResponse {
    pub code_valid: bool,
}

/// Bank-boundary operations for account information consents.
#[async_trait]
pub trait AisConsentSpi: Send + Sync {
    async fn initiate_ais_consent(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiInitiateAisConsentResponse>;

    async fn get_consent_status(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConsentStatusResponse>;

    async fn revoke_ais_consent(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()>;

    async fn authorise_psu(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        password: &Secret<String>,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiPsuAuthorisationResponse>;

    async fn request_available_sca_methods(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAvailableScaMethodsResponse>;

    async fn request_authorisation_code(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorizationCodeResult>;

    async fn start_sca_decoupled(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: Option<&str>,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorisationDecoupledScaResponse>;

    async fn verify_sca_authorisation(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        sca_authentication_data: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()>;

    async fn check_confirmation_code(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        confirmation_code: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConfirmationCodeCheckResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateConsentRequest, TppInfo};
    use chrono::Utc;

    #[test]
    fn test_spi_consent_carries_tpp_access() {
        let request = CreateConsentRequest {
            access: AccountAccess::all_accounts(),
            recurring_indicator: true,
            valid_until: Utc::now().date_naive(),
            frequency_per_day: 4,
            combined_service_indicator: false,
        };
        let consent = AisConsent::new(
            "c-1".to_string(),
            &request,
            &PsuIdData::new("psu"),
            &TppInfo::new("tpp-1"),
            Utc::now(),
        );

        let spi_consent = SpiAccountConsent::from(&consent);
        assert_eq!(spi_consent.id, "c-1");
        assert_eq!(spi_consent.access, AccountAccess::all_accounts());
        assert_eq!(spi_consent.tpp_authorisation_number, "tpp-1");
    }

    #[test]
    fn test_context_provider() {
        let ctx = RequestContext::new(TppInfo::new("tpp-1")).with_x_request_id("x-1");
        let provided = SpiContextDataProvider.provide(&PsuIdData::new("psu"), &ctx);
        assert_eq!(provided.psu_data.psu_id.as_deref(), Some("psu"));
        assert_eq!(provided.internal_request_id, ctx.internal_request_id);

        let ambient = SpiContextDataProvider.provide_ambient(&ctx);
        assert!(ambient.psu_data.is_empty());
        assert_eq!(ambient.x_request_id.as_deref(), Some("x-1"));
    }
}
