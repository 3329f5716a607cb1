use super::{AisAuthorisationService, AuthorisationCore};
use crate::context::RequestContext;
use crate::models::{
    CreateConsentAuthorisationResponse, MessageError, MessageErrorCode, PsuIdData, ScaApproach,
    ScaStatus, UpdateConsentPsuDataRequest, UpdateConsentPsuDataResponse,
};
use crate::spi::SpiAccountConsent;
use async_trait::async_trait;

/// The PSU authenticates in the gateway, then confirms on a separate device.
pub struct DecoupledAisAuthorisationService {
    core: AuthorisationCore,
}

impl DecoupledAisAuthorisationService {
    pub fn new(core: AuthorisationCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl AisAuthorisationService for DecoupledAisAuthorisationService {
    fn sca_approach(&self) -> ScaApproach {
        ScaApproach::Decoupled
    }

    async fn create_consent_authorisation(
        &self,
        ctx: &RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<CreateConsentAuthorisationResponse, MessageError> {
        let authorisation = self.core.create(psu, consent_id, ScaApproach::Decoupled).await?;

        Ok(CreateConsentAuthorisationResponse {
            consent_id: consent_id.to_string(),
            authorisation_id: authorisation.id,
            sca_status: authorisation.sca_status,
            chosen_sca_approach: ScaApproach::Decoupled,
            sca_redirect_link: None,
            internal_request_id: ctx.internal_request_id,
        })
    }

    async fn update_consent_psu_data(
        &self,
        ctx: &RequestContext,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        if request.is_confirmation_step() {
            return self.core.confirm(ctx, request).await;
        }

        let consent = self.core.load_consent(&request.consent_id).await?;
        let mut authorisation = self
            .core
            .load_authorisation(&request.consent_id, &request.authorisation_id)
            .await?;
        self.core.ensure_open(&authorisation)?;

        if !matches!(
            authorisation.sca_status,
            ScaStatus::Received | ScaStatus::PsuIdentified
        ) {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::StatusInvalid,
                format!("Decoupled SCA already {}", authorisation.sca_status),
            ));
        }

        self.core.identify(&mut authorisation, &request.psu_data);

        let Some(password) = request.password.as_ref() else {
            if request.is_identification_only() && !request.psu_data.is_empty() {
                return self
                    .core
                    .finish(&consent, &mut authorisation, ScaStatus::PsuIdentified)
                    .await;
            }
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "PSU identification or password expected",
            ));
        };

        let spi_context = self.core.spi_context(ctx, &self.core.psu_of(&authorisation));
        let spi_consent = SpiAccountConsent::from(&consent);
        let mut provider = self.core.bound_provider(&consent.id).await?;

        let exempted = self
            .core
            .authenticate(
                &spi_context,
                &spi_consent,
                &consent,
                &mut authorisation,
                password,
                &mut provider,
            )
            .await?;
        if exempted {
            return self
                .core
                .finish(&consent, &mut authorisation, ScaStatus::Exempted)
                .await;
        }

        let result = self
            .core
            .spi()
            .start_sca_decoupled(
                &spi_context,
                &authorisation.id,
                None,
                &spi_consent,
                &mut provider,
            )
            .await;
        let started = self.core.settle(&mut provider, result).await?;

        let mut response = self
            .core
            .finish(&consent, &mut authorisation, ScaStatus::Started)
            .await?;
        response.psu_message = started.psu_message;
        Ok(response)
    }

    async fn get_authorisation_sca_status(
        &self,
        consent_id: &str,
        authorisation_id: &str,
    ) -> Result<ScaStatus, MessageError> {
        self.core.sca_status(consent_id, authorisation_id).await
    }

    async fn complete_authorisation(
        &self,
        _ctx: &RequestContext,
        consent_id: &str,
        authorisation_id: &str,
        sca_status: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        self.core.complete(consent_id, authorisation_id, sca_status).await
    }
}
