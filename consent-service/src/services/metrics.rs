//! Prometheus metrics for consent-service.
//!
//! Counters are fed once per request when the request context is flushed.

use prometheus::{Encoder, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static AIS_CONSENT_STATUS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static AIS_SCA_STATUS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if PROMETHEUS_REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let consent_status_counter = IntCounterVec::new(
        Opts::new(
            "ais_consent_status_total",
            "Consent statuses reported back to TPPs",
        ),
        &["status"],
    )?;

    let sca_status_counter = IntCounterVec::new(
        Opts::new(
            "ais_sca_status_total",
            "Authorisation SCA statuses reported back to TPPs",
        ),
        &["status"],
    )?;

    registry.register(Box::new(consent_status_counter.clone()))?;
    registry.register(Box::new(sca_status_counter.clone()))?;

    // A concurrent initializer may have won; its registry stays authoritative.
    if PROMETHEUS_REGISTRY.set(registry).is_ok() {
        let _ = AIS_CONSENT_STATUS_TOTAL.set(consent_status_counter);
        let _ = AIS_SCA_STATUS_TOTAL.set(sca_status_counter);
    }

    Ok(())
}

pub fn get_metrics() -> String {
    let Some(registry) = PROMETHEUS_REGISTRY.get() else {
        return "# Metrics recorder not initialized\n".to_string();
    };

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_consent_status(status: &str) {
    if let Some(counter) = AIS_CONSENT_STATUS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

pub fn record_sca_status(status: &str) {
    if let Some(counter) = AIS_SCA_STATUS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_statuses_are_rendered() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_consent_status("valid");
        record_sca_status("finalised");

        let rendered = get_metrics();
        assert!(rendered.contains("ais_consent_status_total"));
        assert!(rendered.contains("status=\"finalised\""));
    }
}
