use super::{AspspConsentDataRepository, ConsentRepository, StoreError, StoreResult};
use crate::models::{
    AccountAccess, AisConsent, Authorisation, ConsentStatus, CreateConsentRequest, PsuIdData,
    TppInfo,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Consent store kept in process memory.
///
/// Used when no database is configured and by the test suite, which reads
/// its call counters and can switch it to an unavailable state.
#[derive(Default)]
pub struct InMemoryConsentRepository {
    consents: RwLock<HashMap<String, AisConsent>>,
    authorisations: RwLock<HashMap<String, Authorisation>>,
    create_calls: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryConsentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store a consent as-is, bypassing creation.
    pub async fn insert_consent(&self, consent: AisConsent) {
        self.consents
            .write()
            .await
            .insert(consent.id.clone(), consent);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store disabled".to_string()));
        }
        Ok(())
    }

    async fn modify_consent<F>(&self, consent_id: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut AisConsent) + Send,
    {
        self.check_available()?;
        if let Some(consent) = self.consents.write().await.get_mut(consent_id) {
            f(consent);
        }
        Ok(())
    }
}

#[async_trait]
impl ConsentRepository for InMemoryConsentRepository {
    async fn create_consent(
        &self,
        request: &CreateConsentRequest,
        psu: &PsuIdData,
        tpp: &TppInfo,
    ) -> StoreResult<AisConsent> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let consent = AisConsent::new(Uuid::new_v4().to_string(), request, psu, tpp, Utc::now());
        self.consents
            .write()
            .await
            .insert(consent.id.clone(), consent.clone());
        Ok(consent)
    }

    async fn get_consent_by_id(&self, consent_id: &str) -> StoreResult<Option<AisConsent>> {
        self.check_available()?;
        Ok(self.consents.read().await.get(consent_id).cloned())
    }

    async fn update_consent_status(
        &self,
        consent_id: &str,
        status: ConsentStatus,
    ) -> StoreResult<()> {
        self.modify_consent(consent_id, |c| c.set_status(status, Utc::now()))
            .await
    }

    async fn update_multilevel_sca_required(
        &self,
        consent_id: &str,
        multilevel_sca_required: bool,
    ) -> StoreResult<()> {
        self.modify_consent(consent_id, |c| {
            c.multilevel_sca_required = multilevel_sca_required
        })
        .await
    }

    async fn update_aspsp_account_access(
        &self,
        consent_id: &str,
        access: &AccountAccess,
    ) -> StoreResult<()> {
        let access = access.clone();
        self.modify_consent(consent_id, move |c| c.aspsp_access = access)
            .await
    }

    async fn add_psu_data(&self, consent_id: &str, psu: &PsuIdData) -> StoreResult<()> {
        let psu = psu.clone();
        self.modify_consent(consent_id, move |c| {
            if !c.psu_data.contains(&psu) {
                c.psu_data.push(psu);
            }
        })
        .await
    }

    async fn create_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()> {
        self.check_available()?;
        self.authorisations
            .write()
            .await
            .insert(authorisation.id.clone(), authorisation.clone());
        Ok(())
    }

    async fn get_authorisation_by_id(
        &self,
        authorisation_id: &str,
    ) -> StoreResult<Option<Authorisation>> {
        self.check_available()?;
        Ok(self.authorisations.read().await.get(authorisation_id).cloned())
    }

    async fn get_authorisations_by_consent_id(
        &self,
        consent_id: &str,
    ) -> StoreResult<Vec<Authorisation>> {
        self.check_available()?;
        let mut authorisations: Vec<Authorisation> = self
            .authorisations
            .read()
            .await
            .values()
            .filter(|a| a.consent_id == consent_id)
            .cloned()
            .collect();
        authorisations.sort_by_key(|a| a.created_at);
        Ok(authorisations)
    }

    async fn update_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()> {
        self.check_available()?;
        self.authorisations
            .write()
            .await
            .insert(authorisation.id.clone(), authorisation.clone());
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.check_available()
    }
}

/// Bank context kept in process memory, with a save counter.
#[derive(Default)]
pub struct InMemoryAspspConsentDataRepository {
    data: RwLock<HashMap<String, Vec<u8>>>,
    save_calls: AtomicU64,
}

impl InMemoryAspspConsentDataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, consent_id: &str) -> Option<Vec<u8>> {
        self.data.read().await.get(consent_id).cloned()
    }
}

#[async_trait]
impl AspspConsentDataRepository for InMemoryAspspConsentDataRepository {
    async fn load(&self, consent_id: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.read().await.get(consent_id).cloned())
    }

    async fn save(&self, consent_id: &str, data: Vec<u8>) -> StoreResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.data
            .write()
            .await
            .insert(consent_id.to_string(), data);
        Ok(())
    }
}
