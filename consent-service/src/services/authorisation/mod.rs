//! SCA authorisation of consents.
//!
//! One [`AisAuthorisationService`] per SCA approach. They share
//! [`AuthorisationCore`], which owns the SCA status machine, the SPI call
//! discipline and the consent status follow-up.

pub mod decoupled;
pub mod embedded;
pub mod redirect;
pub mod redirect_link;

use crate::config::AspspProfile;
use crate::context::RequestContext;
use crate::models::{
    AisConsent, Authorisation, ConsentStatus, CreateConsentAuthorisationResponse, MessageError,
    MessageErrorCode, PsuIdData, ScaApproach, ScaStatus, ServiceType,
    UpdateConsentPsuDataRequest, UpdateConsentPsuDataResponse, ValidationResult,
};
use crate::services::error_mapper::SpiErrorMapper;
use crate::services::internal_error;
use crate::services::store::ConsentRepository;
use crate::spi::{
    AisConsentSpi, BoundSpiAspspConsentDataProvider, SpiAccountConsent,
    SpiAspspConsentDataProviderFactory, SpiAuthorisationStatus, SpiContextData,
    SpiContextDataProvider, SpiResult,
};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::Secret;
use std::sync::Arc;

pub use decoupled::DecoupledAisAuthorisationService;
pub use embedded::EmbeddedAisAuthorisationService;
pub use redirect::RedirectAisAuthorisationService;
pub use redirect_link::RedirectLinkBuilder;

#[async_trait]
pub trait AisAuthorisationService: Send + Sync {
    fn sca_approach(&self) -> ScaApproach;

    async fn create_consent_authorisation(
        &self,
        ctx: &RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<CreateConsentAuthorisationResponse, MessageError>;

    async fn update_consent_psu_data(
        &self,
        ctx: &RequestContext,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError>;

    async fn get_authorisation_sca_status(
        &self,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<ScaStatus, MessageError>;

    /// Result of an SCA the PSU performed outside the gateway.
    async fn complete_authorisation(
        &self,
        ctx: &RequestContext,
        consent_id: &str,
        authorisation_id: &str,
        sca_status: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError>;
}

/// Picks the strategy for an SCA approach.
#[derive(Clone)]
pub struct AisScaAuthorisationServiceResolver {
    redirect: Arc<dyn AisAuthorisationService>,
    embedded: Arc<dyn AisAuthorisationService>,
    decoupled: Arc<dyn AisAuthorisationService>,
    default_approach: ScaApproach,
}

impl AisScaAuthorisationServiceResolver {
    pub fn new(core: AuthorisationCore) -> Self {
        let default_approach = core.profile().default_sca_approach();
        let link_builder = RedirectLinkBuilder::new(core.profile().ais_redirect_url_to_aspsp.clone());

        Self {
            redirect: Arc::new(RedirectAisAuthorisationService::new(core.clone(), link_builder)),
            embedded: Arc::new(EmbeddedAisAuthorisationService::new(core.clone())),
            decoupled: Arc::new(DecoupledAisAuthorisationService::new(core)),
            default_approach,
        }
    }

    /// Strategy for the ASPSP's default approach.
    pub fn get_service(&self) -> Arc<dyn AisAuthorisationService> {
        self.get_service_for(self.default_approach)
    }

    pub fn get_service_for(&self, approach: ScaApproach) -> Arc<dyn AisAuthorisationService> {
        match approach {
            ScaApproach::Redirect => self.redirect.clone(),
            ScaApproach::Embedded => self.embedded.clone(),
            ScaApproach::Decoupled => self.decoupled.clone(),
        }
    }
}

/// State and SPI plumbing shared by all approaches.
#[derive(Clone)]
pub struct AuthorisationCore {
    repository: Arc<dyn ConsentRepository>,
    spi: Arc<dyn AisConsentSpi>,
    data_providers: SpiAspspConsentDataProviderFactory,
    context_provider: SpiContextDataProvider,
    error_mapper: SpiErrorMapper,
    profile: Arc<AspspProfile>,
}

impl AuthorisationCore {
    pub fn new(
        repository: Arc<dyn ConsentRepository>,
        spi: Arc<dyn AisConsentSpi>,
        data_providers: SpiAspspConsentDataProviderFactory,
        profile: Arc<AspspProfile>,
    ) -> Self {
        Self {
            repository,
            spi,
            data_providers,
            context_provider: SpiContextDataProvider,
            error_mapper: SpiErrorMapper,
            profile,
        }
    }

    pub fn profile(&self) -> &AspspProfile {
        &self.profile
    }

    pub(crate) fn spi(&self) -> &dyn AisConsentSpi {
        self.spi.as_ref()
    }

    pub(crate) async fn load_consent(&self, consent_id: &str) -> Result<AisConsent, MessageError> {
        match self.repository.get_consent_by_id(consent_id).await {
            Ok(Some(consent)) => Ok(consent),
            Ok(None) => Err(MessageError::ais(MessageErrorCode::ConsentUnknown403)),
            Err(e) => Err(internal_error("Failed to load consent", &e)),
        }
    }

    /// Authorisation `authorisation_id` of consent `consent_id`.
    pub(crate) async fn load_authorisation(
        &self,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<Authorisation, MessageError> {
        match self.repository.get_authorisation_by_id(authorisation_id).await {
            Ok(Some(authorisation)) if authorisation.consent_id == consent_id => Ok(authorisation),
            Ok(_) => Err(MessageError::ais(MessageErrorCode::ResourceUnknown403)),
            Err(e) => Err(internal_error("Failed to load authorisation", &e)),
        }
    }

    pub(crate) async fn create(
        &self,
        psu: &PsuIdData,
        consent_id: &str,
        approach: ScaApproach,
    ) -> Result<Authorisation, MessageError> {
        let consent = self.load_consent(consent_id).await?;
        let authorisation = Authorisation::new(consent_id, psu, approach, Utc::now());

        self.repository
            .create_authorisation(&authorisation)
            .await
            .map_err(|e| internal_error("Failed to create authorisation", &e))?;

        if consent.multilevel_sca_required
            && !psu.is_empty()
            && !consent.psu_data.iter().any(|p| p.matches(psu))
        {
            self.repository
                .add_psu_data(consent_id, psu)
                .await
                .map_err(|e| internal_error("Failed to register PSU on consent", &e))?;
        }

        tracing::info!(
            consent_id = %consent_id,
            authorisation_id = %authorisation.id,
            sca_status = authorisation.sca_status.as_str(),
            sca_approach = approach.as_str(),
            "Consent authorisation created"
        );

        Ok(authorisation)
    }

    /// Move forward in the SCA status machine; staying put is allowed.
    pub(crate) fn advance(&self, authorisation: &mut Authorisation, next: ScaStatus) -> ValidationResult {
        if authorisation.sca_status == next {
            return Ok(());
        }
        if !authorisation.sca_status.can_transition_to(next) {
            tracing::warn!(
                authorisation_id = %authorisation.id,
                from = authorisation.sca_status.as_str(),
                to = next.as_str(),
                "Refused SCA status transition"
            );
            return Err(MessageError::ais_with_text(
                MessageErrorCode::StatusInvalid,
                format!(
                    "Authorisation cannot move from {} to {}",
                    authorisation.sca_status, next
                ),
            ));
        }
        authorisation.sca_status = next;
        authorisation.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn ensure_open(&self, authorisation: &Authorisation) -> ValidationResult {
        if authorisation.sca_status.is_finalised() {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::StatusInvalid,
                format!("Authorisation is {}", authorisation.sca_status),
            ));
        }
        Ok(())
    }

    pub(crate) async fn save(&self, authorisation: &Authorisation) -> Result<(), MessageError> {
        self.repository
            .update_authorisation(authorisation)
            .await
            .map_err(|e| internal_error("Failed to update authorisation", &e))
    }

    pub(crate) fn spi_context(&self, ctx: &RequestContext, psu: &PsuIdData) -> SpiContextData {
        self.context_provider.provide(psu, ctx)
    }

    /// Record a PSU identity supplied with an update.
    pub(crate) fn identify(&self, authorisation: &mut Authorisation, psu: &PsuIdData) {
        if !psu.is_empty() {
            authorisation.psu_data = Some(psu.clone());
        }
    }

    pub(crate) fn psu_of(&self, authorisation: &Authorisation) -> PsuIdData {
        authorisation.psu_data.clone().unwrap_or_default()
    }

    pub(crate) async fn bound_provider(
        &self,
        consent_id: &str,
    ) -> Result<BoundSpiAspspConsentDataProvider, MessageError> {
        self.data_providers
            .provider_for(consent_id)
            .await
            .map_err(|e| internal_error("Failed to load bank context", &e))
    }

    /// Persist the bank context after a successful SPI call, translate a failure.
    pub(crate) async fn settle<T>(
        &self,
        provider: &mut BoundSpiAspspConsentDataProvider,
        result: SpiResult<T>,
    ) -> Result<T, MessageError> {
        match result {
            Ok(value) => {
                provider
                    .commit()
                    .await
                    .map_err(|e| internal_error("Failed to save bank context", &e))?;
                Ok(value)
            }
            Err(e) => {
                provider.discard();
                tracing::warn!(
                    consent_id = %provider.consent_id(),
                    error = %e,
                    "SPI call failed"
                );
                Err(self.error_mapper.map_to_error(&e, ServiceType::Ais))
            }
        }
    }

    /// Move to `next`, persist and propagate to the consent.
    pub(crate) async fn finish(
        &self,
        consent: &AisConsent,
        authorisation: &mut Authorisation,
        next: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        self.advance(authorisation, next)?;
        self.save(authorisation).await?;
        let consent_status = self.follow_up(consent, authorisation).await?;

        let mut response = UpdateConsentPsuDataResponse::new(authorisation);
        response.consent_status = consent_status;
        Ok(response)
    }

    /// Check the PSU password. `Ok(true)` means the ASPSP exempted the PSU
    /// from SCA. A rejected password fails the authorisation.
    pub(crate) async fn authenticate(
        &self,
        spi_context: &SpiContextData,
        spi_consent: &SpiAccountConsent,
        consent: &AisConsent,
        authorisation: &mut Authorisation,
        password: &Secret<String>,
        provider: &mut BoundSpiAspspConsentDataProvider,
    ) -> Result<bool, MessageError> {
        let result = self
            .spi
            .authorise_psu(spi_context, &authorisation.id, password, spi_consent, provider)
            .await;
        let authorised = self.settle(provider, result).await?;

        if authorised.status == SpiAuthorisationStatus::Failure {
            tracing::warn!(
                consent_id = %consent.id,
                authorisation_id = %authorisation.id,
                "PSU authentication rejected by ASPSP"
            );
            self.finish(consent, authorisation, ScaStatus::Failed).await?;
            return Err(MessageError::ais(MessageErrorCode::PsuCredentialsInvalid));
        }

        Ok(authorised.sca_exempted)
    }

    /// Consent status implied by a finalised authorisation.
    async fn follow_up(
        &self,
        consent: &AisConsent,
        authorisation: &Authorisation,
    ) -> Result<Option<ConsentStatus>, MessageError> {
        if consent.status.is_finalised() {
            return Ok(None);
        }

        let next = match authorisation.sca_status {
            ScaStatus::Finalised | ScaStatus::Exempted => {
                if consent.multilevel_sca_required && self.has_pending_psus(consent).await? {
                    ConsentStatus::PartiallyAuthorised
                } else {
                    ConsentStatus::Valid
                }
            }
            ScaStatus::Failed => ConsentStatus::Rejected,
            _ => return Ok(None),
        };

        if next != consent.status {
            self.repository
                .update_consent_status(&consent.id, next)
                .await
                .map_err(|e| internal_error("Failed to update consent status", &e))?;
            tracing::info!(
                consent_id = %consent.id,
                authorisation_id = %authorisation.id,
                consent_status = next.as_str(),
                "Consent status changed by authorisation"
            );
        }

        Ok(Some(next))
    }

    async fn has_pending_psus(&self, consent: &AisConsent) -> Result<bool, MessageError> {
        let authorisations = self
            .repository
            .get_authorisations_by_consent_id(&consent.id)
            .await
            .map_err(|e| internal_error("Failed to load authorisations", &e))?;

        let authorised: Vec<&PsuIdData> = authorisations
            .iter()
            .filter(|a| matches!(a.sca_status, ScaStatus::Finalised | ScaStatus::Exempted))
            .filter_map(|a| a.psu_data.as_ref())
            .collect();

        Ok(consent
            .psu_data
            .iter()
            .any(|psu| !authorised.iter().any(|a| a.matches(psu))))
    }

    /// Check the confirmation code of an `UNCONFIRMED` authorisation.
    pub(crate) async fn confirm(
        &self,
        ctx: &RequestContext,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        let Some(code) = request.confirmation_code.as_deref() else {
            return Err(MessageError::ais(MessageErrorCode::FormatError));
        };

        let consent = self.load_consent(&request.consent_id).await?;
        let mut authorisation = self
            .load_authorisation(&request.consent_id, &request.authorisation_id)
            .await?;

        if authorisation.sca_status != ScaStatus::Unconfirmed {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::StatusInvalid,
                format!("Authorisation is {}", authorisation.sca_status),
            ));
        }

        let spi_context = self.spi_context(ctx, &self.psu_of(&authorisation));
        let spi_consent = SpiAccountConsent::from(&consent);
        let mut provider = self.bound_provider(&consent.id).await?;
        let result = self
            .spi
            .check_confirmation_code(
                &spi_context,
                &authorisation.id,
                code,
                &spi_consent,
                &mut provider,
            )
            .await;
        let checked = self.settle(&mut provider, result).await?;

        let next = if checked.code_valid {
            ScaStatus::Finalised
        } else {
            tracing::warn!(authorisation_id = %authorisation.id, "Confirmation code mismatch");
            ScaStatus::Failed
        };
        self.finish(&consent, &mut authorisation, next).await
    }

    pub(crate) async fn sca_status(
        &self,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<ScaStatus, MessageError> {
        Ok(self
            .load_authorisation(consent_id, authorisation_id)
            .await?
            .sca_status)
    }

    /// Apply an SCA result reported by the ASPSP.
    ///
    /// When the ASPSP mandates a confirmation of the authorisation, a reported
    /// `FINALISED` parks the authorisation in `UNCONFIRMED` until the TPP
    /// sends the confirmation code.
    pub(crate) async fn complete(
        &self,
        consent_id: &str,
        authorisation_id: &str,
        reported: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        let consent = self.load_consent(consent_id).await?;
        let mut authorisation = self.load_authorisation(consent_id, authorisation_id).await?;

        let next = if reported == ScaStatus::Finalised
            && self.profile.authorisation_confirmation_request_mandated
        {
            ScaStatus::Unconfirmed
        } else {
            reported
        };

        self.finish(&consent, &mut authorisation, next).await
    }
}
