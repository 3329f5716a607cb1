//! Consent store seam.
//!
//! Lookups return `Ok(None)` for an unknown id and `Err` for a store that
//! could not answer, so the two are never conflated. Implementations own
//! per-consent mutation atomicity.

pub mod memory;
pub mod mongo;

use crate::models::{
    AccountAccess, AisConsent, Authorisation, ConsentStatus, CreateConsentRequest, PsuIdData,
    TppInfo,
};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::{InMemoryAspspConsentDataRepository, InMemoryConsentRepository};
pub use mongo::{MongoAspspConsentDataRepository, MongoConsentRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ConsentRepository: Send + Sync {
    /// Persist a new consent shell in `RECEIVED` and return it with its id.
    async fn create_consent(
        &self,
        request: &CreateConsentRequest,
        psu: &PsuIdData,
        tpp: &TppInfo,
    ) -> StoreResult<AisConsent>;

    async fn get_consent_by_id(&self, consent_id: &str) -> StoreResult<Option<AisConsent>>;

    async fn update_consent_status(&self, consent_id: &str, status: ConsentStatus)
        -> StoreResult<()>;

    async fn update_multilevel_sca_required(
        &self,
        consent_id: &str,
        multilevel_sca_required: bool,
    ) -> StoreResult<()>;

    async fn update_aspsp_account_access(
        &self,
        consent_id: &str,
        access: &AccountAccess,
    ) -> StoreResult<()>;

    /// Register one more PSU on a multilevel consent.
    async fn add_psu_data(&self, consent_id: &str, psu: &PsuIdData) -> StoreResult<()>;

    async fn create_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()>;

    async fn get_authorisation_by_id(
        &self,
        authorisation_id: &str,
    ) -> StoreResult<Option<Authorisation>>;

    async fn get_authorisations_by_consent_id(
        &self,
        consent_id: &str,
    ) -> StoreResult<Vec<Authorisation>>;

    async fn update_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Storage of the opaque per-consent bank context.
#[async_trait]
pub trait AspspConsentDataRepository: Send + Sync {
    async fn load(&self, consent_id: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn save(&self, consent_id: &str, data: Vec<u8>) -> StoreResult<()>;
}
