use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audited TPP request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CreateAisConsentRequestReceived,
    GetAisConsentRequestReceived,
    GetAisConsentStatusRequestReceived,
    DeleteAisConsentRequestReceived,
    StartAisConsentAuthorisationRequestReceived,
    UpdateAisConsentPsuDataRequestReceived,
    GetConsentAuthorisationsRequestReceived,
    GetConsentScaStatusRequestReceived,
    CompleteAisConsentAuthorisationRequestReceived,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CreateAisConsentRequestReceived => "CREATE_AIS_CONSENT_REQUEST_RECEIVED",
            EventType::GetAisConsentRequestReceived => "GET_AIS_CONSENT_REQUEST_RECEIVED",
            EventType::GetAisConsentStatusRequestReceived => {
                "GET_AIS_CONSENT_STATUS_REQUEST_RECEIVED"
            }
            EventType::DeleteAisConsentRequestReceived => "DELETE_AIS_CONSENT_REQUEST_RECEIVED",
            EventType::StartAisConsentAuthorisationRequestReceived => {
                "START_AIS_CONSENT_AUTHORISATION_REQUEST_RECEIVED"
            }
            EventType::UpdateAisConsentPsuDataRequestReceived => {
                "UPDATE_AIS_CONSENT_PSU_DATA_REQUEST_RECEIVED"
            }
            EventType::GetConsentAuthorisationsRequestReceived => {
                "GET_CONSENT_AUTHORISATIONS_REQUEST_RECEIVED"
            }
            EventType::GetConsentScaStatusRequestReceived => {
                "GET_CONSENT_SCA_STATUS_REQUEST_RECEIVED"
            }
            EventType::CompleteAisConsentAuthorisationRequestReceived => {
                "COMPLETE_AIS_CONSENT_AUTHORISATION_REQUEST_RECEIVED"
            }
        }
    }
}

/// Audit record of one TPP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AisEvent {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_request_id: Option<String>,
    pub internal_request_id: Uuid,
    pub tpp_authorisation_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}
