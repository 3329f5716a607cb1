pub mod authorisation;
pub mod authorisation_method_decider;
pub mod consent_service;
pub mod endpoint_access_checker;
pub mod error_mapper;
pub mod events;
pub mod metrics;
pub mod psu_data_checker;
pub mod store;
pub mod validation;

use crate::models::{MessageError, MessageErrorCode};
use std::fmt::Display;

pub use authorisation::{
    AisAuthorisationService, AisScaAuthorisationServiceResolver, AuthorisationCore,
};
pub use authorisation_method_decider::AuthorisationMethodDecider;
pub use consent_service::ConsentService;
pub use endpoint_access_checker::AisEndpointAccessChecker;
pub use error_mapper::SpiErrorMapper;
pub use events::{EventService, InMemoryEventService, MongoEventService};
pub use metrics::{get_metrics, init_metrics};
pub use psu_data_checker::AuthorisationPsuDataChecker;
pub use validation::{AccountCatalog, ConsentValidationService, InMemoryAccountCatalog};

/// Log an infrastructure failure and hide it behind a generic AIS 500.
pub(crate) fn internal_error(context: &str, error: &dyn Display) -> MessageError {
    tracing::error!(error = %error, "{}", context);
    MessageError::ais(MessageErrorCode::InternalServerError)
}
