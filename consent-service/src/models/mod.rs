pub mod account;
pub mod authorisation;
pub mod consent;
pub mod error;
pub mod event;
pub mod psu;

pub use account::{
    AccountAccess, AccountAccessType, AccountIdentifier, AccountReference,
    AdditionalInformationAccess,
};
pub use authorisation::{
    AuthenticationObject, Authorisation, ChallengeData, CreateConsentAuthorisationResponse,
    ScaApproach, ScaStatus, UnknownScaApproach, UpdateConsentPsuDataRequest,
    UpdateConsentPsuDataResponse,
};
pub use consent::{
    AisConsent, ConsentStatus, ConsentStatusResponse, CreateConsentRequest,
    CreateConsentResponse, TppInfo,
};
pub use error::{
    ErrorType, MessageCategory, MessageError, MessageErrorCode, ServiceType,
    TppMessageInformation, ValidationResult,
};
pub use event::{AisEvent, EventType};
pub use psu::PsuIdData;
