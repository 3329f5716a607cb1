use crate::models::ScaStatus;
use crate::services::store::ConsentRepository;
use std::sync::Arc;

/// Gates authorisation-scoped endpoints on the authorisation's SCA status.
#[derive(Clone)]
pub struct AisEndpointAccessChecker {
    repository: Arc<dyn ConsentRepository>,
}

impl AisEndpointAccessChecker {
    pub fn new(repository: Arc<dyn ConsentRepository>) -> Self {
        Self { repository }
    }

    pub async fn is_endpoint_accessible(
        &self,
        authorisation_id: &str,
        confirmation_mandated: bool,
    ) -> bool {
        let authorisation = match self.repository.get_authorisation_by_id(authorisation_id).await {
            Ok(Some(authorisation)) => authorisation,
            Ok(None) => return false,
            Err(e) => {
                tracing::error!(
                    authorisation_id = %authorisation_id,
                    error = %e,
                    "Failed to load authorisation for access check"
                );
                return false;
            }
        };

        match authorisation.sca_status {
            ScaStatus::Unconfirmed => true,
            ScaStatus::Received => !confirmation_mandated,
            _ => true,
        }
    }
}
