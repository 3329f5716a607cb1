use super::{AisAuthorisationService, AuthorisationCore};
use crate::context::RequestContext;
use crate::models::{
    AisConsent, AuthenticationObject, Authorisation, CreateConsentAuthorisationResponse,
    MessageError, MessageErrorCode, PsuIdData, ScaApproach, ScaStatus,
    UpdateConsentPsuDataRequest, UpdateConsentPsuDataResponse,
};
use crate::spi::{BoundSpiAspspConsentDataProvider, SpiAccountConsent, SpiContextData};
use async_trait::async_trait;

/// The whole SCA dialogue runs through the gateway.
///
/// Each update is dispatched on the authorisation's current SCA status:
/// password, then SCA method selection, then the one-time password, then
/// the optional confirmation code.
pub struct EmbeddedAisAuthorisationService {
    core: AuthorisationCore,
}

/// Everything one SPI round trip needs.
struct Exchange {
    consent: AisConsent,
    spi_context: SpiContextData,
    spi_consent: SpiAccountConsent,
    provider: BoundSpiAspspConsentDataProvider,
}

impl EmbeddedAisAuthorisationService {
    pub fn new(core: AuthorisationCore) -> Self {
        Self { core }
    }

    async fn exchange(
        &self,
        ctx: &RequestContext,
        consent: AisConsent,
        authorisation: &Authorisation,
    ) -> Result<Exchange, MessageError> {
        let spi_context = self.core.spi_context(ctx, &self.core.psu_of(authorisation));
        let spi_consent = SpiAccountConsent::from(&consent);
        let provider = self.core.bound_provider(&consent.id).await?;
        Ok(Exchange {
            consent,
            spi_context,
            spi_consent,
            provider,
        })
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        consent: AisConsent,
        mut authorisation: Authorisation,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
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

        let mut exchange = self.exchange(ctx, consent, &authorisation).await?;
        let exempted = self
            .core
            .authenticate(
                &exchange.spi_context,
                &exchange.spi_consent,
                &exchange.consent,
                &mut authorisation,
                password,
                &mut exchange.provider,
            )
            .await?;
        if exempted {
            return self
                .core
                .finish(&exchange.consent, &mut authorisation, ScaStatus::Exempted)
                .await;
        }

        let result = self
            .core
            .spi()
            .request_available_sca_methods(
                &exchange.spi_context,
                &authorisation.id,
                &exchange.spi_consent,
                &mut exchange.provider,
            )
            .await;
        let methods = self
            .core
            .settle(&mut exchange.provider, result)
            .await?
            .available_sca_methods;

        match methods.len() {
            0 => {
                tracing::info!(
                    authorisation_id = %authorisation.id,
                    "No SCA method required by ASPSP"
                );
                self.core
                    .finish(&exchange.consent, &mut authorisation, ScaStatus::Finalised)
                    .await
            }
            1 => {
                let method = methods[0].clone();
                authorisation.available_sca_methods = methods;
                self.start_method(&mut exchange, &mut authorisation, method)
                    .await
            }
            _ => {
                authorisation.available_sca_methods = methods;
                let mut response = self
                    .core
                    .finish(
                        &exchange.consent,
                        &mut authorisation,
                        ScaStatus::PsuAuthenticated,
                    )
                    .await?;
                response.available_sca_methods = authorisation.available_sca_methods.clone();
                Ok(response)
            }
        }
    }

    async fn select_method(
        &self,
        ctx: &RequestContext,
        consent: AisConsent,
        mut authorisation: Authorisation,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        let Some(method_id) = request.authentication_method_id.as_deref() else {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "SCA method selection expected",
            ));
        };

        let Some(method) = authorisation
            .available_sca_methods
            .iter()
            .find(|m| m.authentication_method_id == method_id)
            .cloned()
        else {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::ScaMethodUnknown,
                format!("Unknown SCA method {}", method_id),
            ));
        };

        let mut exchange = self.exchange(ctx, consent, &authorisation).await?;
        self.start_method(&mut exchange, &mut authorisation, method)
            .await
    }

    /// Decoupled methods push to the PSU's device; the others send a challenge.
    async fn start_method(
        &self,
        exchange: &mut Exchange,
        authorisation: &mut Authorisation,
        method: AuthenticationObject,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        let method_id = method.authentication_method_id.clone();
        authorisation.authentication_method_id = Some(method_id.clone());

        if method.decoupled {
            let result = self
                .core
                .spi()
                .start_sca_decoupled(
                    &exchange.spi_context,
                    &authorisation.id,
                    Some(&method_id),
                    &exchange.spi_consent,
                    &mut exchange.provider,
                )
                .await;
            let started = self.core.settle(&mut exchange.provider, result).await?;

            let mut response = self
                .core
                .finish(&exchange.consent, authorisation, ScaStatus::Started)
                .await?;
            response.psu_message = started.psu_message;
            response.chosen_sca_method = Some(method);
            return Ok(response);
        }

        let result = self
            .core
            .spi()
            .request_authorisation_code(
                &exchange.spi_context,
                &authorisation.id,
                &method_id,
                &exchange.spi_consent,
                &mut exchange.provider,
            )
            .await;
        let code = self.core.settle(&mut exchange.provider, result).await?;

        let mut response = self
            .core
            .finish(
                &exchange.consent,
                authorisation,
                ScaStatus::ScaMethodSelected,
            )
            .await?;
        response.chosen_sca_method = Some(code.selected_sca_method.unwrap_or(method));
        response.challenge_data = code.challenge_data;
        Ok(response)
    }

    async fn verify(
        &self,
        ctx: &RequestContext,
        consent: AisConsent,
        mut authorisation: Authorisation,
        request: &UpdateConsentPsuDataRequest,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        let Some(sca_data) = request.sca_authentication_data.as_deref() else {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "SCA authentication data expected",
            ));
        };

        let mut exchange = self.exchange(ctx, consent, &authorisation).await?;
        let result = self
            .core
            .spi()
            .verify_sca_authorisation(
                &exchange.spi_context,
                &authorisation.id,
                sca_data,
                &exchange.spi_consent,
                &mut exchange.provider,
            )
            .await;

        if let Err(error) = self.core.settle(&mut exchange.provider, result).await {
            self.core
                .finish(&exchange.consent, &mut authorisation, ScaStatus::Failed)
                .await?;
            return Err(error);
        }

        let next = if self.core.profile().authorisation_confirmation_request_mandated {
            ScaStatus::Unconfirmed
        } else {
            ScaStatus::Finalised
        };
        self.core
            .finish(&exchange.consent, &mut authorisation, next)
            .await
    }
}

#[async_trait]
impl AisAuthorisationService for EmbeddedAisAuthorisationService {
    fn sca_approach(&self) -> ScaApproach {
        ScaApproach::Embedded
    }

    async fn create_consent_authorisation(
        &self,
        ctx: &RequestContext,
        psu: &PsuIdData,
        consent_id: &str,
    ) -> Result<CreateConsentAuthorisationResponse, MessageError> {
        let authorisation = self.core.create(psu, consent_id, ScaApproach::Embedded).await?;

        Ok(CreateConsentAuthorisationResponse {
            consent_id: consent_id.to_string(),
            authorisation_id: authorisation.id,
            sca_status: authorisation.sca_status,
            chosen_sca_approach: ScaApproach::Embedded,
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
        let authorisation = self
            .core
            .load_authorisation(&request.consent_id, &request.authorisation_id)
            .await?;
        self.core.ensure_open(&authorisation)?;

        match authorisation.sca_status {
            ScaStatus::Received | ScaStatus::PsuIdentified => {
                self.authenticate(ctx, consent, authorisation, request).await
            }
            ScaStatus::PsuAuthenticated => {
                self.select_method(ctx, consent, authorisation, request).await
            }
            ScaStatus::ScaMethodSelected => {
                self.verify(ctx, consent, authorisation, request).await
            }
            ScaStatus::Unconfirmed => Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "Confirmation code expected",
            )),
            status => Err(MessageError::ais_with_text(
                MessageErrorCode::StatusInvalid,
                format!("Authorisation is {}", status),
            )),
        }
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
        _consent_id: &str,
        _authorisation_id: &str,
        _sca_status: ScaStatus,
    ) -> Result<UpdateConsentPsuDataResponse, MessageError> {
        Err(MessageError::ais_with_text(
            MessageErrorCode::ServiceInvalid405,
            "Embedded authorisations are completed through PSU data updates",
        ))
    }
}
