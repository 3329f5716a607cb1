//! Business-rule validation run before any side effect.

use crate::config::AspspProfile;
use crate::models::{
    account, AccountReference, AisConsent, CreateConsentRequest, MessageError, MessageErrorCode,
    PsuIdData, TppInfo, ValidationResult,
};
use crate::services::psu_data_checker::AuthorisationPsuDataChecker;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

/// Accounts the ASPSP holds.
pub trait AccountCatalog: Send + Sync {
    fn contains(&self, reference: &AccountReference) -> bool;
}

/// Catalog of known IBANs. Without a list every reference is known.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountCatalog {
    known_ibans: Option<HashSet<String>>,
}

impl InMemoryAccountCatalog {
    pub fn accept_all() -> Self {
        Self { known_ibans: None }
    }

    pub fn with_ibans<I, S>(ibans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known_ibans: Some(ibans.into_iter().map(|i| normalize_iban(i.as_ref())).collect()),
        }
    }
}

fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

impl AccountCatalog for InMemoryAccountCatalog {
    fn contains(&self, reference: &AccountReference) -> bool {
        match (&self.known_ibans, &reference.identifier) {
            (None, _) => true,
            (Some(known), account::AccountIdentifier::Iban(iban)) => {
                known.contains(&normalize_iban(iban))
            }
            (Some(_), _) => false,
        }
    }
}

#[derive(Clone)]
pub struct ConsentValidationService {
    profile: Arc<AspspProfile>,
    catalog: Arc<dyn AccountCatalog>,
    psu_checker: AuthorisationPsuDataChecker,
}

impl ConsentValidationService {
    pub fn new(profile: Arc<AspspProfile>, catalog: Arc<dyn AccountCatalog>) -> Self {
        Self {
            profile,
            catalog,
            psu_checker: AuthorisationPsuDataChecker,
        }
    }

    pub fn validate_on_create(
        &self,
        request: &CreateConsentRequest,
        psu: &PsuIdData,
        tpp: &TppInfo,
    ) -> ValidationResult {
        if let Err(e) = request.validate() {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                e.to_string(),
            ));
        }
        if tpp.validate().is_err() {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "TPP authorisation number is missing",
            ));
        }

        if self.profile.psu_in_initial_request_mandated && psu.is_empty() {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "PSU-ID is required",
            ));
        }

        if request.valid_until < Utc::now().date_naive() {
            return Err(MessageError::ais(MessageErrorCode::PeriodInvalid));
        }

        if !request.recurring_indicator && request.frequency_per_day > 1 {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "One-off consent allows a single access per day",
            ));
        }

        if request.combined_service_indicator && !self.profile.combined_service_indicator_supported {
            return Err(MessageError::ais(MessageErrorCode::SessionsNotSupported));
        }

        self.validate_access(request)
    }

    fn validate_access(&self, request: &CreateConsentRequest) -> ValidationResult {
        let access = &request.access;

        if access.all_psd2.is_some() && !self.profile.all_psd2_supported {
            return Err(MessageError::ais(MessageErrorCode::ParameterNotSupported));
        }

        if (access.available_accounts.is_some() || access.available_accounts_with_balance.is_some())
            && !self.profile.available_accounts_consent_supported
        {
            return Err(MessageError::ais(MessageErrorCode::ServiceInvalid400));
        }

        if access.is_bank_offered() && !self.profile.bank_offered_consent_supported {
            return Err(MessageError::ais(MessageErrorCode::ParameterNotSupported));
        }

        if access.has_global_flags() && access.has_references() {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::FormatError,
                "Global access flags cannot be combined with account references",
            ));
        }

        let owner_name_references = access
            .additional_information
            .iter()
            .filter_map(|info| info.owner_name.as_ref())
            .flatten();

        for reference in access.references().chain(owner_name_references) {
            self.validate_reference(reference)?;
        }

        Ok(())
    }

    fn validate_reference(&self, reference: &AccountReference) -> ValidationResult {
        if let Some(currency) = &reference.currency {
            if !account::is_valid_currency(currency) {
                return Err(MessageError::ais_with_text(
                    MessageErrorCode::FormatError,
                    format!("Invalid currency code: {}", currency),
                ));
            }
        }

        if let account::AccountIdentifier::Iban(iban) = &reference.identifier {
            if !account::is_valid_iban(iban) {
                return Err(MessageError::ais_with_text(
                    MessageErrorCode::FormatError,
                    "Invalid IBAN format",
                ));
            }
        }

        if !self.catalog.contains(reference) {
            return Err(MessageError::ais_with_text(
                MessageErrorCode::ParameterNotConsistent,
                "Account is unknown to the ASPSP",
            ));
        }

        Ok(())
    }

    fn validate_tpp(&self, consent: &AisConsent, tpp: &TppInfo) -> ValidationResult {
        if !consent.belongs_to(tpp) {
            tracing::warn!(
                consent_id = %consent.id,
                tpp = %tpp.authorisation_number,
                "TPP does not own the consent"
            );
            return Err(MessageError::ais(MessageErrorCode::ConsentUnknown403));
        }
        Ok(())
    }

    pub fn validate_on_getting_status(&self, consent: &AisConsent, tpp: &TppInfo) -> ValidationResult {
        self.validate_tpp(consent, tpp)
    }

    pub fn validate_on_getting_by_id(&self, consent: &AisConsent, tpp: &TppInfo) -> ValidationResult {
        self.validate_tpp(consent, tpp)
    }

    pub fn validate_on_delete(&self, consent: &AisConsent, tpp: &TppInfo) -> ValidationResult {
        self.validate_tpp(consent, tpp)
    }

    pub fn validate_on_create_authorisation(
        &self,
        consent: &AisConsent,
        tpp: &TppInfo,
        psu: &PsuIdData,
    ) -> ValidationResult {
        self.validate_tpp(consent, tpp)?;
        validate_open(consent)?;
        self.validate_psu(consent, psu)
    }

    pub fn validate_on_update_psu_data(
        &self,
        consent: &AisConsent,
        tpp: &TppInfo,
        psu: &PsuIdData,
    ) -> ValidationResult {
        self.validate_tpp(consent, tpp)?;
        validate_open(consent)?;
        self.validate_psu(consent, psu)
    }

    /// Redirect and decoupled completion arrive from the bank, not the TPP.
    pub fn validate_on_complete_authorisation(&self, consent: &AisConsent) -> ValidationResult {
        validate_open(consent)
    }

    /// Only checked when both the consent and the request name a PSU.
    fn validate_psu(&self, consent: &AisConsent, psu: &PsuIdData) -> ValidationResult {
        if psu.is_empty() || consent.psu_data.is_empty() {
            return Ok(());
        }
        if self
            .psu_checker
            .is_psu_data_wrong(consent.multilevel_sca_required, &consent.psu_data, psu)
        {
            return Err(MessageError::ais(MessageErrorCode::PsuCredentialsInvalid));
        }
        Ok(())
    }
}

/// A finalised consent never moves again.
fn validate_open(consent: &AisConsent) -> ValidationResult {
    if consent.status.is_finalised() {
        return Err(MessageError::ais_with_text(
            MessageErrorCode::StatusInvalid,
            format!("Consent is {}", consent.status),
        ));
    }
    Ok(())
}
