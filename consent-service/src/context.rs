//! Per-request state threaded through every consent operation.

use crate::models::{ConsentStatus, ScaStatus, TppInfo};
use crate::services::metrics;
use uuid::Uuid;

/// Statuses reported to the caller during one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingContext {
    consent_status: Option<ConsentStatus>,
    sca_status: Option<ScaStatus>,
}

impl LoggingContext {
    pub fn consent_status(&self) -> Option<ConsentStatus> {
        self.consent_status
    }

    pub fn sca_status(&self) -> Option<ScaStatus> {
        self.sca_status
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub x_request_id: Option<String>,
    pub internal_request_id: Uuid,
    pub tpp: TppInfo,
    pub logging: LoggingContext,
}

impl RequestContext {
    pub fn new(tpp: TppInfo) -> Self {
        Self {
            x_request_id: None,
            internal_request_id: Uuid::new_v4(),
            tpp,
            logging: LoggingContext::default(),
        }
    }

    pub fn with_x_request_id(mut self, x_request_id: impl Into<String>) -> Self {
        self.x_request_id = Some(x_request_id.into());
        self
    }

    pub fn store_consent_status(&mut self, status: ConsentStatus) {
        self.logging.consent_status = Some(status);
    }

    pub fn store_sca_status(&mut self, status: ScaStatus) {
        self.logging.sca_status = Some(status);
    }

    /// Emit what the request projected. Called once, at the end of the request.
    pub fn flush(self) {
        let consent_status = self.logging.consent_status.map(|s| s.as_str());
        let sca_status = self.logging.sca_status.map(|s| s.as_str());

        tracing::info!(
            x_request_id = self.x_request_id.as_deref().unwrap_or("-"),
            internal_request_id = %self.internal_request_id,
            tpp = %self.tpp.authorisation_number,
            consent_status = consent_status.unwrap_or("-"),
            sca_status = sca_status.unwrap_or("-"),
            "Request completed"
        );

        if let Some(status) = consent_status {
            metrics::record_consent_status(status);
        }
        if let Some(status) = sca_status {
            metrics::record_sca_status(status);
        }
    }
}
