//! HTTP client for the ASPSP connector.
//!
//! Every SPI operation is a JSON `POST`. The bank context travels base64
//! encoded in `aspspConsentData` in both directions; error bodies carry the
//! connector's `tppMessages`.

use super::{
    AisConsentSpi, SpiAccountConsent, SpiAspspConsentDataProvider,
    SpiAuthorisationDecoupledScaResponse, SpiAuthorizationCodeResult,
    SpiAvailableScaMethodsResponse, SpiConfirmationCodeCheckResponse, SpiConsentStatusResponse,
    SpiContextData, SpiError, SpiInitiateAisConsentResponse, SpiPsuAuthorisationResponse,
    SpiResult,
};
use crate::config::ConnectorConfig;
use crate::models::{MessageErrorCode, TppMessageInformation};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct AspspConnectorClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorRequest<'a, P> {
    context: &'a SpiContextData,
    consent: &'a SpiAccountConsent,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspsp_consent_data: Option<String>,
    #[serde(flatten)]
    payload: P,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorResponse<R> {
    #[serde(default)]
    aspsp_consent_data: Option<String>,
    #[serde(flatten)]
    body: R,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorErrorBody {
    #[serde(default)]
    tpp_messages: Vec<TppMessageInformation>,
}

#[derive(Serialize, Deserialize, Default)]
struct NoPayload {}

#[derive(Serialize)]
struct PasswordPayload<'a> {
    password: &'a str,
}

#[derive(Serialize)]
struct MethodPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    authentication_method_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ScaDataPayload<'a> {
    sca_authentication_data: &'a str,
}

#[derive(Serialize)]
struct ConfirmationPayload<'a> {
    confirmation_code: &'a str,
}

fn boundary_error(code: MessageErrorCode, text: String) -> SpiError {
    SpiError::new(TppMessageInformation::with_text(code, text))
}

impl AspspConnectorClient {
    pub fn new(config: &ConnectorConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn call<P, R>(
        &self,
        path: &str,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        payload: P,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = ConnectorRequest {
            context: ctx,
            consent,
            aspsp_consent_data: provider.load_aspsp_consent_data().map(|d| STANDARD.encode(d)),
            payload,
        };

        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("x-request-id", ctx.internal_request_id.to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "ASPSP connector unreachable");
                boundary_error(
                    MessageErrorCode::ServiceUnavailable,
                    "ASPSP connector unreachable".to_string(),
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Failed to read ASPSP connector response");
            boundary_error(
                MessageErrorCode::ServiceUnavailable,
                "ASPSP connector response interrupted".to_string(),
            )
        })?;

        tracing::debug!(status = %status, url = %url, "ASPSP connector response");

        if !status.is_success() {
            let error: ConnectorErrorBody = serde_json::from_str(&body).unwrap_or_default();
            tracing::warn!(
                status = %status,
                url = %url,
                messages = error.tpp_messages.len(),
                "ASPSP connector rejected request"
            );
            if error.tpp_messages.is_empty() {
                return Err(boundary_error(
                    MessageErrorCode::InternalServerError,
                    format!("ASPSP connector returned {}", status),
                ));
            }
            return Err(SpiError {
                tpp_messages: error.tpp_messages,
            });
        }

        let parsed: ConnectorResponse<R> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(url = %url, error = %e, "Malformed ASPSP connector response");
            boundary_error(
                MessageErrorCode::InternalServerError,
                "Malformed ASPSP connector response".to_string(),
            )
        })?;

        if let Some(encoded) = parsed.aspsp_consent_data {
            let data = STANDARD.decode(encoded).map_err(|e| {
                tracing::error!(url = %url, error = %e, "Malformed bank context from connector");
                boundary_error(
                    MessageErrorCode::InternalServerError,
                    "Malformed bank context".to_string(),
                )
            })?;
            provider.update_aspsp_consent_data(data);
        }

        Ok(parsed.body)
    }

    fn authorisation_path(consent: &SpiAccountConsent, authorisation_id: &str, step: &str) -> String {
        format!(
            "/ais/consents/{}/authorisations/{}/{}",
            consent.id, authorisation_id, step
        )
    }
}

#[async_trait]
impl AisConsentSpi for AspspConnectorClient {
    async fn initiate_ais_consent(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiInitiateAisConsentResponse> {
        self.call("/ais/consents", ctx, consent, NoPayload {}, provider)
            .await
    }

    async fn get_consent_status(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConsentStatusResponse> {
        let path = format!("/ais/consents/{}/status", consent.id);
        self.call(&path, ctx, consent, NoPayload {}, provider).await
    }

    async fn revoke_ais_consent(
        &self,
        ctx: &SpiContextData,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()> {
        let path = format!("/ais/consents/{}/revoke", consent.id);
        let _: NoPayload = self.call(&path, ctx, consent, NoPayload {}, provider).await?;
        Ok(())
    }

    async fn authorise_psu(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        password: &Secret<String>,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiPsuAuthorisationResponse> {
        let path = Self::authorisation_path(consent, authorisation_id, "psu");
        let payload = PasswordPayload {
            password: password.expose_secret(),
        };
        self.call(&path, ctx, consent, payload, provider).await
    }

    async fn request_available_sca_methods(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAvailableScaMethodsResponse> {
        let path = Self::authorisation_path(consent, authorisation_id, "methods");
        self.call(&path, ctx, consent, NoPayload {}, provider).await
    }

    async fn request_authorisation_code(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorizationCodeResult> {
        let path = Self::authorisation_path(consent, authorisation_id, "code");
        let payload = MethodPayload {
            authentication_method_id: Some(authentication_method_id),
        };
        self.call(&path, ctx, consent, payload, provider).await
    }

    async fn start_sca_decoupled(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        authentication_method_id: Option<&str>,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiAuthorisationDecoupledScaResponse> {
        let path = Self::authorisation_path(consent, authorisation_id, "decoupled");
        let payload = MethodPayload {
            authentication_method_id,
        };
        self.call(&path, ctx, consent, payload, provider).await
    }

    async fn verify_sca_authorisation(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        sca_authentication_data: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<()> {
        let path = Self::authorisation_path(consent, authorisation_id, "verify");
        let payload = ScaDataPayload {
            sca_authentication_data,
        };
        let _: NoPayload = self.call(&path, ctx, consent, payload, provider).await?;
        Ok(())
    }

    async fn check_confirmation_code(
        &self,
        ctx: &SpiContextData,
        authorisation_id: &str,
        confirmation_code: &str,
        consent: &SpiAccountConsent,
        provider: &mut dyn SpiAspspConsentDataProvider,
    ) -> SpiResult<SpiConfirmationCodeCheckResponse> {
        let path = Self::authorisation_path(consent, authorisation_id, "confirmation");
        let payload = ConfirmationPayload { confirmation_code };
        self.call(&path, ctx, consent, payload, provider).await
    }
}
