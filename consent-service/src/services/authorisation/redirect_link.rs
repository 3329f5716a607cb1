use uuid::Uuid;

const REDIRECT_ID: &str = "{redirect-id}";
const ENCRYPTED_CONSENT_ID: &str = "{encrypted-consent-id}";
const INTERNAL_REQUEST_ID: &str = "{inr-id}";

/// Fills the ASPSP's SCA redirect URL template.
#[derive(Debug, Clone)]
pub struct RedirectLinkBuilder {
    template: String,
}

impl RedirectLinkBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn build_consent_sca_redirect_link(
        &self,
        consent_id: &str,
        authorisation_id: &str,
        internal_request_id: Uuid,
    ) -> String {
        self.template
            .replace(REDIRECT_ID, authorisation_id)
            .replace(ENCRYPTED_CONSENT_ID, consent_id)
            .replace(INTERNAL_REQUEST_ID, &internal_request_id.to_string())
    }
}
