use crate::config::AspspProfile;
use crate::models::AisConsent;

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorisationMethodDecider;

impl AuthorisationMethodDecider {
    /// Whether the authorisation is started together with the consent.
    ///
    /// Multilevel consents are always authorised explicitly, one PSU at a time.
    pub fn is_implicit_method(&self, explicit_preferred: bool, multilevel_sca_required: bool) -> bool {
        !multilevel_sca_required && !explicit_preferred
    }

    /// One-off consent for the list of available accounts, which needs a
    /// single factor unless the ASPSP asks for SCA on it.
    pub fn is_one_factor_authorisation(&self, consent: &AisConsent, profile: &AspspProfile) -> bool {
        consent.is_one_off()
            && consent.tpp_access.is_available_accounts_only()
            && !profile.sca_by_one_time_available_accounts_consent_required
    }
}
