use super::{AisAuthorisationService, AuthorisationCore, RedirectLinkBuilder};
use crate::context::RequestContext;
use crate::models::{
    CreateConsentAuthorisationResponse, MessageError, MessageErrorCode, PsuIdData, ScaApproach,
    ScaStatus, UpdateConsentPsuDataRequest, UpdateConsentPsuDataResponse,
};
use async_trait::async_trait;

/// SCA happens on the ASPSP's own pages; the TPP only gets a link.
pub struct RedirectAisAuthorisationService {
    core: AuthorisationCore,
    link_builder: RedirectLinkBuilder,
}

impl RedirectAisAuthorisationService {
    pub fn new(core: AuthorisationCore, link_builder: RedirectLinkBuilder) -> Self {
        Self { core, link_builder }
    }
}

#[async_trait]
impl AisAuthorisationService for RedirectAisAuthorisationService {
    fn sca_approach(&self) -> ScaApproach {
        ScaApproach::Redirect
    }

    async fn create_consent_authorisation(
        &self,
        ctx: &RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<CreateConsentAuthorisationResponse, MessageError> {
        let authorisation = self.core.create(psu, consent_id, ScaApproach::Redirect).await?;
        let link = self.link_builder.build_consent_sca_redirect_link(
            consent_id,
            &authorisation.id,
            ctx.internal_request_id,
        );

        Ok(CreateConsentAuthorisationResponse {
            consent_id: consent_id.to_string(),
            authorisation_id: authorisation.id,
            sca_status: authorisation.sca_status,
            chosen_sca_approach: ScaApproach::Redirect,
            sca_redirect_link: Some(link),
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
        Err(MessageError::ais_with_text(
            MessageErrorCode::ServiceInvalid405,
            "PSU data cannot be updated for a redirect authorisation",
        ))
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
