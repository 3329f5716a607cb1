//! Audit trail of TPP requests.
//!
//! Recording is best effort: a failing sink is logged and never changes the
//! outcome of the request being audited.

use crate::context::RequestContext;
use crate::models::{AisEvent, EventType};
use crate::services::store::StoreResult;
use async_trait::async_trait;
use chrono::Utc;
use mongodb::{Collection, Database};
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait EventService: Send + Sync {
    async fn save_event(&self, event: AisEvent) -> StoreResult<()>;

    async fn record_tpp_request(
        &self,
        ctx: &RequestContext,
        event_type: EventType,
        payload: Option<serde_json::Value>,
    ) {
        self.record(build_event(ctx, None, event_type, payload)).await;
    }

    async fn record_ais_tpp_request(
        &self,
        ctx: &RequestContext,
        consent_id: &str,
        event_type: EventType,
    ) {
        self.record(build_event(ctx, Some(consent_id), event_type, None))
            .await;
    }

    async fn record(&self, event: AisEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.save_event(event).await {
            tracing::warn!(
                event_type = event_type.as_str(),
                error = %e,
                "Failed to record audit event"
            );
        }
    }
}

fn build_event(
    ctx: &RequestContext,
    consent_id: Option<&str>,
    event_type: EventType,
    payload: Option<serde_json::Value>,
) -> AisEvent {
    AisEvent {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        event_type,
        consent_id: consent_id.map(str::to_string),
        x_request_id: ctx.x_request_id.clone(),
        internal_request_id: ctx.internal_request_id,
        tpp_authorisation_number: ctx.tpp.authorisation_number.clone(),
        payload,
    }
}

#[derive(Clone)]
pub struct MongoEventService {
    collection: Collection<AisEvent>,
}

impl MongoEventService {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("ais_events"),
        }
    }
}

#[async_trait]
impl EventService for MongoEventService {
    async fn save_event(&self, event: AisEvent) -> StoreResult<()> {
        self.collection.insert_one(event, None).await?;
        Ok(())
    }
}

/// Keeps events in memory, in recording order.
#[derive(Default)]
pub struct InMemoryEventService {
    events: RwLock<Vec<AisEvent>>,
}

impl InMemoryEventService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AisEvent> {
        self.events.read().await.clone()
    }

    pub async fn event_types(&self) -> Vec<EventType> {
        self.events
            .read()
            .await
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[async_trait]
impl EventService for InMemoryEventService {
    async fn save_event(&self, event: AisEvent) -> StoreResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TppInfo;
    use crate::services::store::StoreError;

    struct FailingEventService;

    #[async_trait]
    impl EventService for FailingEventService {
        async fn save_event(&self, _event: AisEvent) -> StoreResult<()> {
            Err(StoreError::Unavailable("audit sink down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_events_carry_request_identity() {
        let service = InMemoryEventService::new();
        let ctx = RequestContext::new(TppInfo::new("tpp-1")).with_x_request_id("x-1");

        service
            .record_ais_tpp_request(&ctx, "c-1", EventType::DeleteAisConsentRequestReceived)
            .await;

        let events = service.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].consent_id.as_deref(), Some("c-1"));
        assert_eq!(events[0].x_request_id.as_deref(), Some("x-1"));
        assert_eq!(events[0].internal_request_id, ctx.internal_request_id);
        assert_eq!(events[0].tpp_authorisation_number, "tpp-1");
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let ctx = RequestContext::new(TppInfo::new("tpp-1"));
        FailingEventService
            .record_tpp_request(&ctx, EventType::CreateAisConsentRequestReceived, None)
            .await;
    }
}
