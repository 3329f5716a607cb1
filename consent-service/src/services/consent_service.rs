//! Orchestration of AIS consent requests.
//!
//! Every operation audits the request, validates it, drives the SPI with the
//! right bank-context provider and projects the resulting statuses into the
//! [`RequestContext`].

use crate::config::AspspProfile;
use crate::context::RequestContext;
use crate::models::{
    AisConsent, Authorisation, ConsentStatus, ConsentStatusResponse,
    CreateConsentAuthorisationResponse, CreateConsentRequest, CreateConsentResponse, EventType,
    MessageError, MessageErrorCode, PsuIdData, ScaStatus, ServiceType,
    UpdateConsentPsuDataRequest, UpdateConsentPsuDataResponse,
};
use crate::services::authorisation::{AisScaAuthorisationServiceResolver, AuthorisationCore};
use crate::services::authorisation_method_decider::AuthorisationMethodDecider;
use crate::services::endpoint_access_checker::AisEndpointAccessChecker;
use crate::services::error_mapper::SpiErrorMapper;
use crate::services::events::EventService;
use crate::services::internal_error;
use crate::services::store::{AspspConsentDataRepository, ConsentRepository};
use crate::services::validation::{AccountCatalog, ConsentValidationService};
use crate::spi::{
    AisConsentSpi, BoundSpiAspspConsentDataProvider, SpiAccountConsent, SpiContextDataProvider,
    SpiAspspConsentDataProviderFactory, SpiResult,
};
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ConsentService {
    profile: Arc<AspspProfile>,
    repository: Arc<dyn ConsentRepository>,
    spi: Arc<dyn AisConsentSpi>,
    data_providers: SpiAspspConsentDataProviderFactory,
    validation: ConsentValidationService,
    events: Arc<dyn EventService>,
    authorisations: AisScaAuthorisationServiceResolver,
    endpoint_checker: AisEndpointAccessChecker,
    decider: AuthorisationMethodDecider,
    context_provider: SpiContextDataProvider,
    error_mapper: SpiErrorMapper,
}

impl ConsentService {
    pub fn new(
        profile: Arc<AspspProfile>,
        repository: Arc<dyn ConsentRepository>,
        data_repository: Arc<dyn AspspConsentDataRepository>,
        spi: Arc<dyn AisConsentSpi>,
        catalog: Arc<dyn AccountCatalog>,
        events: Arc<dyn EventService>,
    ) -> Self {
        let data_providers = SpiAspspConsentDataProviderFactory::new(data_repository);
        let core = AuthorisationCore::new(
            repository.clone(),
            spi.clone(),
            data_providers.clone(),
            profile.clone(),
        );

        Self {
            validation: ConsentValidationService::new(profile.clone(), catalog),
            authorisations: AisScaAuthorisationServiceResolver::new(core),
            endpoint_checker: AisEndpointAccessChecker::new(repository.clone()),
            decider: AuthorisationMethodDecider,
            context_provider: SpiContextDataProvider,
            error_mapper: SpiErrorMapper,
            profile,
            repository,
            spi,
            data_providers,
            events,
        }
    }

    pub async fn health_check(&self) -> bool {
        self.repository.health_check().await.is_ok()
    }

    pub async fn create_consent(
        &self,
        ctx: &mut RequestContext,
        request: CreateConsentRequest,
        psu: &PsuIdData,
        explicit_preferred: bool,
    ) -> Result<CreateConsentResponse, MessageError> {
        self.events
            .record_tpp_request(
                ctx,
                EventType::CreateAisConsentRequestReceived,
                serde_json::to_value(&request).ok(),
            )
            .await;

        let request = self.augment(request);
        if let Err(e) = self.validation.validate_on_create(&request, psu, &ctx.tpp) {
            tracing::warn!(
                tpp = %ctx.tpp.authorisation_number,
                error = %e,
                "Consent creation rejected"
            );
            return Err(e);
        }

        let mut consent = self
            .repository
            .create_consent(&request, psu, &ctx.tpp)
            .await
            .map_err(|e| internal_error("Failed to create consent", &e))?;

        let spi_context = self.context_provider.provide(psu, ctx);
        let spi_consent = SpiAccountConsent::from(&consent);
        let mut provider = self.data_providers.initial_provider();

        let initiated = match self
            .spi
            .initiate_ais_consent(&spi_context, &spi_consent, &mut provider)
            .await
        {
            Ok(initiated) => initiated,
            Err(e) => {
                tracing::warn!(consent_id = %consent.id, error = %e, "Consent initiation failed");
                return Err(self.error_mapper.map_to_error(&e, ServiceType::Ais));
            }
        };

        provider
            .save_with(&consent.id)
            .await
            .map_err(|e| internal_error("Failed to save bank context", &e))?;

        let multilevel = initiated.multilevel_sca_required
            && !self
                .decider
                .is_one_factor_authorisation(&consent, &self.profile);
        self.repository
            .update_multilevel_sca_required(&consent.id, multilevel)
            .await
            .map_err(|e| internal_error("Failed to update consent", &e))?;
        self.repository
            .update_aspsp_account_access(&consent.id, &initiated.account_access)
            .await
            .map_err(|e| internal_error("Failed to update consent", &e))?;
        consent.multilevel_sca_required = multilevel;
        consent.aspsp_access = initiated.account_access;

        tracing::info!(
            consent_id = %consent.id,
            consent_status = consent.status.as_str(),
            multilevel_sca_required = multilevel,
            "Consent created"
        );

        let mut response = CreateConsentResponse {
            consent_id: consent.id.clone(),
            consent_status: consent.status,
            psu_message: initiated.psu_message,
            multilevel_sca_required: multilevel,
            authorisation_id: None,
            sca_status: None,
            sca_redirect_link: None,
            internal_request_id: ctx.internal_request_id,
        };

        if self.decider.is_implicit_method(explicit_preferred, multilevel) {
            let service = self.authorisations.get_service();
            match service
                .create_consent_authorisation(ctx, psu, &consent.id)
                .await
            {
                Ok(authorisation) => {
                    response.authorisation_id = Some(authorisation.authorisation_id);
                    response.sca_status = Some(authorisation.sca_status);
                    response.sca_redirect_link = authorisation.sca_redirect_link;
                }
                Err(e) => {
                    tracing::warn!(
                        consent_id = %consent.id,
                        error = %e,
                        "Implicit authorisation could not be started"
                    );
                }
            }
        }

        ctx.store_consent_status(consent.status);
        if let Some(sca_status) = response.sca_status {
            ctx.store_sca_status(sca_status);
        }

        Ok(response)
    }

    pub async fn get_consent_status_by_id(
        &self,
        ctx: &mut RequestContext,
        consent_id: &str,
    ) -> Result<ConsentStatusResponse, MessageError> {
        self.events
            .record_ais_tpp_request(ctx, consent_id, EventType::GetAisConsentStatusRequestReceived)
            .await;

        let mut consent = self.load_consent(consent_id).await?;
        self.validation
            .validate_on_getting_status(&consent, &ctx.tpp)?;

        let psu_message = self.refresh_status(ctx, &mut consent).await?;
        ctx.store_consent_status(consent.status);

        Ok(ConsentStatusResponse {
            consent_status: consent.status,
            psu_message,
        })
    }

    pub async fn get_consent_by_id(
        &self,
        ctx: &mut RequestContext,
        consent_id: &str,
    ) -> Result<AisConsent, MessageError> {
        self.events
            .record_ais_tpp_request(ctx, consent_id, EventType::GetAisConsentRequestReceived)
            .await;

        let mut consent = self.load_consent(consent_id).await?;
        self.validation.validate_on_getting_by_id(&consent, &ctx.tpp)?;

        self.refresh_status(ctx, &mut consent).await?;
        ctx.store_consent_status(consent.status);

        Ok(consent)
    }

    pub async fn delete_consent_by_id(
        &self,
        ctx: &mut RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<(), MessageError> {
        self.events
            .record_ais_tpp_request(ctx, consent_id, EventType::DeleteAisConsentRequestReceived)
            .await;

        let consent = self.load_consent(consent_id).await?;
        self.validation.validate_on_delete(&consent, &ctx.tpp)?;

        let spi_context = self.context_provider.provide(psu, ctx);
        let spi_consent = SpiAccountConsent::from(&consent);
        let mut provider = self.provider_for(consent_id).await?;
        let result = self
            .spi
            .revoke_ais_consent(&spi_context, &spi_consent, &mut provider)
            .await;
        self.settle(&mut provider, result).await?;

        self.repository
            .update_consent_status(consent_id, ConsentStatus::TerminatedByTpp)
            .await
            .map_err(|e| internal_error("Failed to update consent status", &e))?;

        tracing::info!(consent_id = %consent_id, "Consent terminated by TPP");
        ctx.store_consent_status(ConsentStatus::TerminatedByTpp);
        Ok(())
    }

    /// Explicit start of an authorisation with the ASPSP's default approach.
    pub async fn create_consent_authorisation(
        &self,
        ctx: &mut RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<CreateConsentAuthorisationResponse, MessageError> {
        self.events
            .record_ais_tpp_request(
                ctx,
                consent_id,
                EventType::StartAisConsentAuthorisationRequestReceived,
            )
            .await;

        let consent = self.load_consent(consent_id).await?;
        self.validation
            .validate_on_create_authorisation(&consent, &ctx.tpp, psu)?;

        let service = self.authorisations.get_service();
        let response = service
            .create_consent_authorisation(ctx, psu, consent_id)
            .await?;

        tracing::info!(
            consent_id = %consent_id,
            authorisation_id = %response.authorisation_id,
            sca_approach = service.sca_approach().as_str(),
            "Consent authorisation started"
        );
        ctx.store_sca_status(response.sca_status);
        Ok(response)
    }

    pub async fn update_consent_psu_data(
        &self,
        ctx: &mut RequestContext,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        self.events
            .record_ais_tpp_request(
                ctx,
                &request.consent_id,
                EventType::UpdateAisConsentPsuDataRequestReceived,
            )
            .await;

        let consent = self.load_consent(&request.consent_id).await?;
        let authorisation = self
            .load_authorisation(&request.consent_id, &request.authorisation_id)
            .await?;

        if !self
            .endpoint_checker
            .is_endpoint_accessible(&request.authorisation_id, request.is_confirmation_step())
            .await
        {
            tracing::warn!(
                consent_id = %request.consent_id,
                authorisation_id = %request.authorisation_id,
                sca_status = authorisation.sca_status.as_str(),
                "Authorisation endpoint blocked"
            );
            return Err(MessageError::ais(MessageErrorCode::ServiceBlocked));
        }

        self.validation
            .validate_on_update_psu_data(&consent, &ctx.tpp, &request.psu_data)?;

        let response = self
            .authorisations
            .get_service_for(authorisation.chosen_sca_approach)
            .update_consent_psu_data(ctx, request)
            .await?;

        ctx.store_sca_status(response.sca_status);
        if let Some(consent_status) = response.consent_status {
            ctx.store_consent_status(consent_status);
        }
        Ok(response)
    }

    /// Ids of every authorisation started for the consent.
    pub async fn get_consent_authorisations(
        &self,
        ctx: &mut RequestContext,
        consent_id: &str,
    ) -> Result<Vec<String>, MessageError> {
        self.events
            .record_ais_tpp_request(
                ctx,
                consent_id,
                EventType::GetConsentAuthorisationsRequestReceived,
            )
            .await;

        let consent = self.load_consent(consent_id).await?;
        self.validation.validate_on_getting_by_id(&consent, &ctx.tpp)?;

        let authorisations = self
            .repository
            .get_authorisations_by_consent_id(consent_id)
            .await
            .map_err(|e| internal_error("Failed to load authorisations", &e))?;

        ctx.store_consent_status(consent.status);
        Ok(authorisations.into_iter().map(|a| a.id).collect())
    }

    pub async fn get_consent_authorisation_sca_status(
        &self,
        ctx: &mut RequestContext,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<ScaStatus, MessageError> {
        self.events
            .record_ais_tpp_request(ctx, consent_id, EventType::GetConsentScaStatusRequestReceived)
            .await;

        let consent = self.load_consent(consent_id).await?;
        self.validation.validate_on_getting_by_id(&consent, &ctx.tpp)?;
        let authorisation = self.load_authorisation(consent_id, authorisation_id).await?;

        let sca_status = self
            .authorisations
            .get_service_for(authorisation.chosen_sca_approach)
            .get_authorisation_sca_status(consent_id, authorisation_id)
            .await?;

        ctx.store_sca_status(sca_status);
        Ok(sca_status)
    }

    /// SCA result reported by the ASPSP for a redirect or decoupled authorisation.
    pub async fn complete_authorisation(
        &self,
        ctx: &mut RequestContext,
        consent_id: &str,
        authorisation_id: &str,
        sca_status: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        self.events
            .record_ais_tpp_request(
                ctx,
                consent_id,
                EventType::CompleteAisConsentAuthorisationRequestReceived,
            )
            .await;

        let consent = self.load_consent(consent_id).await?;
        self.validation.validate_on_complete_authorisation(&consent)?;
        let authorisation = self.load_authorisation(consent_id, authorisation_id).await?;

        let response = self
            .authorisations
            .get_service_for(authorisation.chosen_sca_approach)
            .complete_authorisation(ctx, consent_id, authorisation_id, sca_status)
            .await?;

        tracing::info!(
            consent_id = %consent_id,
            authorisation_id = %authorisation_id,
            reported = sca_status.as_str(),
            sca_status = response.sca_status.as_str(),
            "Authorisation completed by ASPSP"
        );

        ctx.store_sca_status(response.sca_status);
        if let Some(consent_status) = response.consent_status {
            ctx.store_consent_status(consent_status);
        }
        Ok(response)
    }

    fn augment(&self, mut request: CreateConsentRequest) -> CreateConsentRequest {
        if !self.profile.account_owner_information_supported {
            request.access.additional_information = None;
        }
        request
    }

    async fn load_consent(&self, consent_id: &str) -> Result<AisConsent, MessageError> {
        match self.repository.get_consent_by_id(consent_id).await {
            Ok(Some(consent)) => Ok(consent),
            Ok(None) => {
                tracing::warn!(consent_id = %consent_id, "Consent not found");
                Err(MessageError::ais(MessageErrorCode::ConsentUnknown403))
            }
            Err(e) => Err(internal_error("Failed to load consent", &e)),
        }
    }

    async fn load_authorisation(
        &self,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<Authorisation, MessageError> {
        match self.repository.get_authorisation_by_id(authorisation_id).await {
            Ok(Some(authorisation)) if authorisation.consent_id == consent_id => Ok(authorisation),
            Ok(_) => {
                tracing::warn!(
                    consent_id = %consent_id,
                    authorisation_id = %authorisation_id,
                    "Authorisation not found"
                );
                Err(MessageError::ais(MessageErrorCode::ResourceUnknown403))
            }
            Err(e) => Err(internal_error("Failed to load authorisation", &e)),
        }
    }

    async fn provider_for(
        &self,
        consent_id: &str,
    ) -> Result<BoundSpiAspspConsentDataProvider, MessageError> {
        self.data_providers
            .provider_for(consent_id)
            .await
            .map_err(|e| internal_error("Failed to load bank context", &e))
    }

    async fn settle<T>(
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
                tracing::warn!(consent_id = %provider.consent_id(), error = %e, "SPI call failed");
                Err(self.error_mapper.map_to_error(&e, ServiceType::Ais))
            }
        }
    }

    /// Ask the ASPSP for the current status of a non-terminal consent.
    async fn refresh_status(
        &self,
        ctx: &RequestContext,
        consent: &mut AisConsent,
    ) -> Result<Option<String>, MessageError> {
        if consent.status.is_finalised() {
            return Ok(None);
        }

        let spi_context = self.context_provider.provide_ambient(ctx);
        let spi_consent = SpiAccountConsent::from(&*consent);
        let mut provider = self.provider_for(&consent.id).await?;
        let result = self
            .spi
            .get_consent_status(&spi_context, &spi_consent, &mut provider)
            .await;
        let status = self.settle(&mut provider, result).await?;

        if status.consent_status != consent.status {
            self.repository
                .update_consent_status(&consent.id, status.consent_status)
                .await
                .map_err(|e| internal_error("Failed to update consent status", &e))?;
            tracing::info!(
                consent_id = %consent.id,
                from = consent.status.as_str(),
                to = status.consent_status.as_str(),
                "Consent status refreshed from ASPSP"
            );
            consent.set_status(status.consent_status, Utc::now());
        }

        Ok(status.psu_message)
    }
}
