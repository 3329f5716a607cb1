//! Caller-facing error taxonomy.
//!
//! Every failure a TPP can observe is a [`MessageError`]: an [`ErrorType`]
//! (service family plus HTTP status class) and one or more TPP messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service family an error is reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    Ais,
    Pis,
    Piis,
    Sb,
}

impl ServiceType {
    pub const ALL: [ServiceType; 4] = [
        ServiceType::Ais,
        ServiceType::Pis,
        ServiceType::Piis,
        ServiceType::Sb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Ais => "AIS",
            ServiceType::Pis => "PIS",
            ServiceType::Piis => "PIIS",
            ServiceType::Sb => "SB",
        }
    }
}

/// HTTP status classes a service family may answer with.
const SUPPORTED_STATUSES: [u16; 10] = [400, 401, 403, 404, 405, 406, 409, 429, 500, 503];

/// Service-family scoped error type, e.g. `AIS_400`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorType {
    pub service_type: ServiceType,
    pub status: u16,
}

impl ErrorType {
    pub const fn new(service_type: ServiceType, status: u16) -> Self {
        Self {
            service_type,
            status,
        }
    }

    pub const fn ais(status: u16) -> Self {
        Self::new(ServiceType::Ais, status)
    }

    /// Error type a given message code is reported with in a service family.
    pub fn for_code(service_type: ServiceType, code: MessageErrorCode) -> Self {
        Self::new(service_type, code.http_status())
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_STATUSES.contains(&self.status)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.service_type.as_str(), self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageCategory {
    Error,
    Warning,
}

/// Berlin Group message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageErrorCode {
    FormatError,
    ParameterNotConsistent,
    ParameterNotSupported,
    #[serde(rename = "SERVICE_INVALID_400")]
    ServiceInvalid400,
    #[serde(rename = "SERVICE_INVALID_405")]
    ServiceInvalid405,
    #[serde(rename = "RESOURCE_UNKNOWN_400")]
    ResourceUnknown400,
    #[serde(rename = "RESOURCE_UNKNOWN_403")]
    ResourceUnknown403,
    #[serde(rename = "RESOURCE_UNKNOWN_404")]
    ResourceUnknown404,
    #[serde(rename = "RESOURCE_EXPIRED_403")]
    ResourceExpired403,
    PeriodInvalid,
    TimestampInvalid,
    SessionsNotSupported,
    ScaMethodUnknown,
    ScaInvalid,
    ConsentInvalid,
    ConsentExpired,
    #[serde(rename = "CONSENT_UNKNOWN_400")]
    ConsentUnknown400,
    #[serde(rename = "CONSENT_UNKNOWN_403")]
    ConsentUnknown403,
    PsuCredentialsInvalid,
    CorporateIdInvalid,
    CertificateInvalid,
    Unauthorized,
    TokenInvalid,
    TokenExpired,
    ServiceBlocked,
    RequestedFormatsInvalid,
    StatusInvalid,
    AccessExceeded,
    InternalServerError,
    ServiceUnavailable,
}

impl MessageErrorCode {
    pub const ALL: [MessageErrorCode; 30] = [
        MessageErrorCode::FormatError,
        MessageErrorCode::ParameterNotConsistent,
        MessageErrorCode::ParameterNotSupported,
        MessageErrorCode::ServiceInvalid400,
        MessageErrorCode::ServiceInvalid405,
        MessageErrorCode::ResourceUnknown400,
        MessageErrorCode::ResourceUnknown403,
        MessageErrorCode::ResourceUnknown404,
        MessageErrorCode::ResourceExpired403,
        MessageErrorCode::PeriodInvalid,
        MessageErrorCode::TimestampInvalid,
        MessageErrorCode::SessionsNotSupported,
        MessageErrorCode::ScaMethodUnknown,
        MessageErrorCode::ScaInvalid,
        MessageErrorCode::ConsentInvalid,
        MessageErrorCode::ConsentExpired,
        MessageErrorCode::ConsentUnknown400,
        MessageErrorCode::ConsentUnknown403,
        MessageErrorCode::PsuCredentialsInvalid,
        MessageErrorCode::CorporateIdInvalid,
        MessageErrorCode::CertificateInvalid,
        MessageErrorCode::Unauthorized,
        MessageErrorCode::TokenInvalid,
        MessageErrorCode::TokenExpired,
        MessageErrorCode::ServiceBlocked,
        MessageErrorCode::RequestedFormatsInvalid,
        MessageErrorCode::StatusInvalid,
        MessageErrorCode::AccessExceeded,
        MessageErrorCode::InternalServerError,
        MessageErrorCode::ServiceUnavailable,
    ];

    /// HTTP status class the code is reported with.
    pub fn http_status(&self) -> u16 {
        use MessageErrorCode::*;
        match self {
            FormatError
            | ParameterNotConsistent
            | ParameterNotSupported
            | ServiceInvalid400
            | ResourceUnknown400
            | PeriodInvalid
            | TimestampInvalid
            | SessionsNotSupported
            | ScaMethodUnknown
            | ScaInvalid
            | ConsentUnknown400 => 400,
            ConsentInvalid
            | ConsentExpired
            | PsuCredentialsInvalid
            | CorporateIdInvalid
            | CertificateInvalid
            | Unauthorized => 401,
            ResourceUnknown403 | ResourceExpired403 | ConsentUnknown403 | TokenInvalid
            | TokenExpired | ServiceBlocked => 403,
            ResourceUnknown404 => 404,
            ServiceInvalid405 => 405,
            RequestedFormatsInvalid => 406,
            StatusInvalid => 409,
            AccessExceeded => 429,
            InternalServerError => 500,
            ServiceUnavailable => 503,
        }
    }
}

/// A single message returned to the TPP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TppMessageInformation {
    pub category: MessageCategory,
    pub code: MessageErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TppMessageInformation {
    pub fn of(code: MessageErrorCode) -> Self {
        Self {
            category: MessageCategory::Error,
            code,
            text: None,
        }
    }

    pub fn with_text(code: MessageErrorCode, text: impl Into<String>) -> Self {
        Self {
            category: MessageCategory::Error,
            code,
            text: Some(text.into()),
        }
    }
}

/// Error returned to the caller of any consent operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error_type}: {tpp_messages:?}")]
pub struct MessageError {
    pub error_type: ErrorType,
    pub tpp_messages: Vec<TppMessageInformation>,
}

impl MessageError {
    pub fn new(error_type: ErrorType, tpp_message: TppMessageInformation) -> Self {
        Self {
            error_type,
            tpp_messages: vec![tpp_message],
        }
    }

    /// AIS error whose type is derived from the code's status class.
    pub fn ais(code: MessageErrorCode) -> Self {
        Self::new(
            ErrorType::for_code(ServiceType::Ais, code),
            TppMessageInformation::of(code),
        )
    }

    pub fn ais_with_text(code: MessageErrorCode, text: impl Into<String>) -> Self {
        Self::new(
            ErrorType::for_code(ServiceType::Ais, code),
            TppMessageInformation::with_text(code, text),
        )
    }

    /// First message, the one the HTTP layer reports as primary.
    pub fn tpp_message(&self) -> Option<&TppMessageInformation> {
        self.tpp_messages.first()
    }

    pub fn code(&self) -> Option<MessageErrorCode> {
        self.tpp_message().map(|m| m.code)
    }
}

/// Outcome of a business-rule validation.
pub type ValidationResult = Result<(), MessageError>;

impl From<MessageError> for service_core::error::AppError {
    fn from(err: MessageError) -> Self {
        use service_core::error::AppError;

        let status = err.error_type.status;
        let details = anyhow::anyhow!(err.to_string());
        match status {
            400 => AppError::BadRequest(details),
            401 => AppError::Unauthorized(details),
            403 => AppError::Forbidden(details),
            404 => AppError::NotFound(details),
            405 => AppError::MethodNotAllowed(details),
            406 => AppError::NotAcceptable(details),
            409 => AppError::Conflict(details),
            429 => AppError::TooManyRequests(err.to_string()),
            503 => AppError::ServiceUnavailable,
            _ => AppError::InternalError(details),
        }
    }
}
