use crate::models::{ErrorType, MessageError, MessageErrorCode, ServiceType, TppMessageInformation};
use crate::spi::SpiError;

/// Translates bank-boundary failures into caller-facing errors.
///
/// The first TPP message decides the error type; all messages are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpiErrorMapper;

impl SpiErrorMapper {
    pub fn map_to_error(&self, error: &SpiError, service_type: ServiceType) -> MessageError {
        let Some(first) = error.tpp_messages.first() else {
            tracing::error!(
                service = service_type.as_str(),
                "Bank boundary failed without any TPP message"
            );
            return MessageError::new(
                ErrorType::for_code(service_type, MessageErrorCode::InternalServerError),
                TppMessageInformation::of(MessageErrorCode::InternalServerError),
            );
        };

        MessageError {
            error_type: ErrorType::for_code(service_type, first.code),
            tpp_messages: error.tpp_messages.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_maps_for_every_service() {
        let mapper = SpiErrorMapper;
        for service_type in ServiceType::ALL {
            for code in MessageErrorCode::ALL {
                let error = SpiError::new(TppMessageInformation::of(code));
                let mapped = mapper.map_to_error(&error, service_type);
                assert_eq!(mapped.error_type.service_type, service_type);
                assert_eq!(mapped.error_type.status, code.http_status());
                assert!(mapped.error_type.is_supported());
                assert_eq!(mapped.code(), Some(code));
            }
        }
    }

    #[test]
    fn test_known_boundary_codes() {
        let mapper = SpiErrorMapper;
        let blocked = SpiError::new(TppMessageInformation::of(MessageErrorCode::ServiceBlocked));
        assert_eq!(
            mapper.map_to_error(&blocked, ServiceType::Ais).error_type,
            ErrorType::ais(403)
        );

        let format = SpiError::new(TppMessageInformation::of(MessageErrorCode::FormatError));
        assert_eq!(
            mapper.map_to_error(&format, ServiceType::Ais).error_type,
            ErrorType::ais(400)
        );
    }

    #[test]
    fn test_all_messages_are_kept() {
        let error = SpiError {
            tpp_messages: vec![
                TppMessageInformation::of(MessageErrorCode::ConsentInvalid),
                TppMessageInformation::with_text(MessageErrorCode::FormatError, "detail"),
            ],
        };
        let mapped = SpiErrorMapper.map_to_error(&error, ServiceType::Ais);
        assert_eq!(mapped.error_type, ErrorType::ais(401));
        assert_eq!(mapped.tpp_messages.len(), 2);
    }

    #[test]
    fn test_empty_failure_is_internal_error() {
        let error = SpiError {
            tpp_messages: Vec::new(),
        };
        let mapped = SpiErrorMapper.map_to_error(&error, ServiceType::Ais);
        assert_eq!(mapped.error_type, ErrorType::ais(500));
        assert_eq!(mapped.code(), Some(MessageErrorCode::InternalServerError));
    }
}
