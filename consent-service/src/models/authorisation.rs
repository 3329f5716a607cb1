use super::{ConsentStatus, PsuIdData};
use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// SCA status of a single authorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaStatus {
    Received,
    PsuIdentified,
    PsuAuthenticated,
    ScaMethodSelected,
    Started,
    Unconfirmed,
    Finalised,
    Failed,
    Exempted,
}

impl ScaStatus {
    fn rank(&self) -> u8 {
        match self {
            ScaStatus::Received => 0,
            ScaStatus::PsuIdentified => 1,
            ScaStatus::PsuAuthenticated => 2,
            ScaStatus::ScaMethodSelected => 3,
            ScaStatus::Started => 4,
            ScaStatus::Unconfirmed => 5,
            ScaStatus::Finalised | ScaStatus::Failed | ScaStatus::Exempted => 6,
        }
    }

    pub fn is_finalised(&self) -> bool {
        matches!(
            self,
            ScaStatus::Finalised | ScaStatus::Failed | ScaStatus::Exempted
        )
    }

    /// Whether moving to `next` goes strictly forward.
    ///
    /// `FAILED` and `EXEMPTED` can be reached from any non-terminal status.
    pub fn can_transition_to(&self, next: ScaStatus) -> bool {
        if self.is_finalised() {
            return false;
        }
        match next {
            ScaStatus::Failed | ScaStatus::Exempted => true,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScaStatus::Received => "received",
            ScaStatus::PsuIdentified => "psuIdentified",
            ScaStatus::PsuAuthenticated => "psuAuthenticated",
            ScaStatus::ScaMethodSelected => "scaMethodSelected",
            ScaStatus::Started => "started",
            ScaStatus::Unconfirmed => "unconfirmed",
            ScaStatus::Finalised => "finalised",
            ScaStatus::Failed => "failed",
            ScaStatus::Exempted => "exempted",
        }
    }
}

impl fmt::Display for ScaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown SCA approach: {0}")]
pub struct UnknownScaApproach(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum ScaApproach {
    Embedded,
    Redirect,
    Decoupled,
}

impl ScaApproach {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaApproach::Embedded => "EMBEDDED",
            ScaApproach::Redirect => "REDIRECT",
            ScaApproach::Decoupled => "DECOUPLED",
        }
    }
}

impl FromStr for ScaApproach {
    type Err = UnknownScaApproach;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMBEDDED" => Ok(ScaApproach::Embedded),
            "REDIRECT" => Ok(ScaApproach::Redirect),
            "DECOUPLED" => Ok(ScaApproach::Decoupled),
            _ => Err(UnknownScaApproach(s.to_string())),
        }
    }
}

impl TryFrom<String> for ScaApproach {
    type Error = UnknownScaApproach;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ScaApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An SCA method the ASPSP offers to the PSU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationObject {
    pub authentication_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_version: Option<String>,
    pub authentication_method_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub decoupled: bool,
}

impl AuthenticationObject {
    pub fn new(authentication_type: impl Into<String>, method_id: impl Into<String>) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            authentication_version: None,
            authentication_method_id: method_id.into(),
            name: None,
            explanation: None,
            decoupled: false,
        }
    }
}

/// Challenge the PSU must answer after an SCA method was selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<String>,
    #[serde(default)]
    pub data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorisation {
    #[serde(rename = "_id")]
    pub id: String,
    pub consent_id: String,
    pub sca_status: ScaStatus,
    pub chosen_sca_approach: ScaApproach,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_data: Option<PsuIdData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_method_id: Option<String>,
    #[serde(default)]
    pub available_sca_methods: Vec<AuthenticationObject>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authorisation {
    /// New authorisation in `RECEIVED`, or `PSUIDENTIFIED` for a known PSU.
    pub fn new(consent_id: &str, psu: &PsuIdData, approach: ScaApproach, now: DateTime<Utc>) -> Self {
        let (sca_status, psu_data) = if psu.is_empty() {
            (ScaStatus::Received, None)
        } else {
            (ScaStatus::PsuIdentified, Some(psu.clone()))
        };

        Self {
            id: Uuid::new_v4().to_string(),
            consent_id: consent_id.to_string(),
            sca_status,
            chosen_sca_approach: approach,
            psu_data,
            authentication_method_id: None,
            available_sca_methods: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// PSU data update for an existing authorisation.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConsentPsuDataRequest {
    pub consent_id: String,
    pub authorisation_id: String,
    #[serde(default)]
    pub psu_data: PsuIdData,
    #[serde(default)]
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub authentication_method_id: Option<String>,
    #[serde(default)]
    pub sca_authentication_data: Option<String>,
    #[serde(default)]
    pub confirmation_code: Option<String>,
}

impl UpdateConsentPsuDataRequest {
    pub fn new(consent_id: impl Into<String>, authorisation_id: impl Into<String>) -> Self {
        Self {
            consent_id: consent_id.into(),
            authorisation_id: authorisation_id.into(),
            psu_data: PsuIdData::default(),
            password: None,
            authentication_method_id: None,
            sca_authentication_data: None,
            confirmation_code: None,
        }
    }

    pub fn with_psu(mut self, psu: PsuIdData) -> Self {
        self.psu_data = psu;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password.into()));
        self
    }

    pub fn with_method(mut self, method_id: impl Into<String>) -> Self {
        self.authentication_method_id = Some(method_id.into());
        self
    }

    pub fn with_sca_data(mut self, data: impl Into<String>) -> Self {
        self.sca_authentication_data = Some(data.into());
        self
    }

    pub fn with_confirmation_code(mut self, code: impl Into<String>) -> Self {
        self.confirmation_code = Some(code.into());
        self
    }

    pub fn is_confirmation_step(&self) -> bool {
        self.confirmation_code.is_some()
    }

    /// Only PSU identification, no authentication data.
    pub fn is_identification_only(&self) -> bool {
        self.password.is_none()
            && self.authentication_method_id.is_none()
            && self.sca_authentication_data.is_none()
            && self.confirmation_code.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConsentPsuDataResponse {
    pub consent_id: String,
    pub authorisation_id: String,
    pub sca_status: ScaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_status: Option<ConsentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psu_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_sca_methods: Vec<AuthenticationObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_sca_method: Option<AuthenticationObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_data: Option<ChallengeData>,
}

impl UpdateConsentPsuDataResponse {
    pub fn new(authorisation: &Authorisation) -> Self {
        Self {
            consent_id: authorisation.consent_id.clone(),
            authorisation_id: authorisation.id.clone(),
            sca_status: authorisation.sca_status,
            consent_status: None,
            psu_message: None,
            available_sca_methods: Vec::new(),
            chosen_sca_method: None,
            challenge_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConsentAuthorisationResponse {
    pub consent_id: String,
    pub authorisation_id: String,
    pub sca_status: ScaStatus,
    pub chosen_sca_approach: ScaApproach,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sca_redirect_link: Option<String>,
    pub internal_request_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(ScaStatus::Received.can_transition_to(ScaStatus::PsuIdentified));
        assert!(ScaStatus::PsuIdentified.can_transition_to(ScaStatus::Finalised));
        assert!(ScaStatus::Started.can_transition_to(ScaStatus::Unconfirmed));
        assert!(ScaStatus::Unconfirmed.can_transition_to(ScaStatus::Finalised));
    }

    #[test]
    fn test_backward_and_terminal_transitions_refused() {
        assert!(!ScaStatus::Started.can_transition_to(ScaStatus::PsuIdentified));
        assert!(!ScaStatus::PsuAuthenticated.can_transition_to(ScaStatus::PsuAuthenticated));
        assert!(!ScaStatus::Finalised.can_transition_to(ScaStatus::Failed));
        assert!(!ScaStatus::Failed.can_transition_to(ScaStatus::Finalised));
        assert!(!ScaStatus::Exempted.can_transition_to(ScaStatus::Started));
    }

    #[test]
    fn test_failed_and_exempted_reachable_from_any_open_status() {
        for status in [
            ScaStatus::Received,
            ScaStatus::PsuIdentified,
            ScaStatus::PsuAuthenticated,
            ScaStatus::ScaMethodSelected,
            ScaStatus::Started,
            ScaStatus::Unconfirmed,
        ] {
            assert!(status.can_transition_to(ScaStatus::Failed));
            assert!(status.can_transition_to(ScaStatus::Exempted));
        }
    }

    #[test]
    fn test_sca_approach_parsing() {
        assert_eq!(" redirect ".parse(), Ok(ScaApproach::Redirect));
        assert_eq!("Embedded".parse(), Ok(ScaApproach::Embedded));
        assert_eq!("DECOUPLED".parse(), Ok(ScaApproach::Decoupled));
        assert_eq!(
            "oauth".parse::<ScaApproach>(),
            Err(UnknownScaApproach("oauth".to_string()))
        );
    }

    #[test]
    fn test_sca_approach_deserializes_case_insensitively() {
        let approaches: Vec<ScaApproach> = serde_json::from_str(r#"["redirect", "EMBEDDED"]"#).unwrap();
        assert_eq!(approaches, vec![ScaApproach::Redirect, ScaApproach::Embedded]);
        assert!(serde_json::from_str::<ScaApproach>("\"unknown\"").is_err());
        assert_eq!(
            serde_json::to_string(&ScaApproach::Decoupled).unwrap(),
            "\"DECOUPLED\""
        );
    }

    #[test]
    fn test_new_authorisation_status_depends_on_psu() {
        let now = Utc::now();
        let anonymous = Authorisation::new("c", &PsuIdData::default(), ScaApproach::Redirect, now);
        assert_eq!(anonymous.sca_status, ScaStatus::Received);
        let known = Authorisation::new("c", &PsuIdData::new("psu"), ScaApproach::Redirect, now);
        assert_eq!(known.sca_status, ScaStatus::PsuIdentified);
    }

    #[test]
    fn test_sca_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScaStatus::PsuIdentified).unwrap(),
            "\"psuIdentified\""
        );
        assert_eq!(
            serde_json::to_string(&ScaStatus::ScaMethodSelected).unwrap(),
            "\"scaMethodSelected\""
        );
    }
}
