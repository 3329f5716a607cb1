use super::{AccountAccess, PsuIdData, ScaStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Received,
    Rejected,
    Valid,
    RevokedByPsu,
    Expired,
    TerminatedByTpp,
    TerminatedByAspsp,
    PartiallyAuthorised,
}

impl ConsentStatus {
    /// Finalised consents are never sent to the ASPSP again.
    pub fn is_finalised(&self) -> bool {
        matches!(
            self,
            ConsentStatus::Rejected
                | ConsentStatus::RevokedByPsu
                | ConsentStatus::Expired
                | ConsentStatus::TerminatedByTpp
                | ConsentStatus::TerminatedByAspsp
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Received => "received",
            ConsentStatus::Rejected => "rejected",
            ConsentStatus::Valid => "valid",
            ConsentStatus::RevokedByPsu => "revokedByPsu",
            ConsentStatus::Expired => "expired",
            ConsentStatus::TerminatedByTpp => "terminatedByTpp",
            ConsentStatus::TerminatedByAspsp => "terminatedByAspsp",
            ConsentStatus::PartiallyAuthorised => "partiallyAuthorised",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration of the TPP calling the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TppInfo {
    #[validate(length(min = 1))]
    pub authorisation_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TppInfo {
    pub fn new(authorisation_number: impl Into<String>) -> Self {
        Self {
            authorisation_number: authorisation_number.into(),
            name: None,
        }
    }
}

/// Account information consent as held by the consent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AisConsent {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: ConsentStatus,
    pub tpp_access: AccountAccess,
    pub aspsp_access: AccountAccess,
    pub valid_until: NaiveDate,
    pub recurring_indicator: bool,
    pub frequency_per_day: u32,
    pub combined_service_indicator: bool,
    pub multilevel_sca_required: bool,
    pub psu_data: Vec<PsuIdData>,
    pub tpp: TppInfo,
    pub creation_timestamp: DateTime<Utc>,
    pub status_change_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_date: Option<NaiveDate>,
    #[serde(default)]
    pub usages: BTreeMap<String, u32>,
}

impl AisConsent {
    /// New consent shell in `RECEIVED`.
    pub fn new(
        id: String,
        request: &CreateConsentRequest,
        psu: &PsuIdData,
        tpp: &TppInfo,
        now: DateTime<Utc>,
    ) -> Self {
        let psu_data = if psu.is_empty() {
            Vec::new()
        } else {
            vec![psu.clone()]
        };

        Self {
            id,
            status: ConsentStatus::Received,
            tpp_access: request.access.clone(),
            aspsp_access: AccountAccess::default(),
            valid_until: request.valid_until,
            recurring_indicator: request.recurring_indicator,
            frequency_per_day: request.frequency_per_day,
            combined_service_indicator: request.combined_service_indicator,
            multilevel_sca_required: false,
            psu_data,
            tpp: tpp.clone(),
            creation_timestamp: now,
            status_change_timestamp: now,
            last_action_date: None,
            usages: BTreeMap::new(),
        }
    }

    pub fn set_status(&mut self, status: ConsentStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_change_timestamp = now.max(self.creation_timestamp);
    }

    pub fn is_one_off(&self) -> bool {
        !self.recurring_indicator && self.frequency_per_day == 1
    }

    pub fn belongs_to(&self, tpp: &TppInfo) -> bool {
        self.tpp.authorisation_number == tpp.authorisation_number
    }
}

/// Consent creation request coming from the TPP.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateConsentRequest {
    pub access: AccountAccess,
    pub recurring_indicator: bool,
    pub valid_until: NaiveDate,
    #[validate(range(min = 1))]
    pub frequency_per_day: u32,
    #[serde(default)]
    pub combined_service_indicator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConsentResponse {
    pub consent_id: String,
    pub consent_status: ConsentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
    pub multilevel_sca_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorisation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sca_status: Option<ScaStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sca_redirect_link: Option<String>,
    pub internal_request_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentStatusResponse {
    pub consent_status: ConsentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
}
