use crate::services::store::{AspspConsentDataRepository, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// View of the opaque bank context the SPI reads and replaces.
///
/// Writes are buffered; the owner of the provider persists them after the
/// SPI call succeeded.
pub trait SpiAspspConsentDataProvider: Send + Sync {
    fn load_aspsp_consent_data(&self) -> Option<&[u8]>;

    fn update_aspsp_consent_data(&mut self, data: Vec<u8>);
}

#[derive(Debug, Error)]
pub enum ConsentDataError {
    #[error("Bank context already saved under consent {0}")]
    AlreadySaved(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Provider for a consent whose id is not known yet.
pub struct InitialSpiAspspConsentDataProvider {
    repository: Arc<dyn AspspConsentDataRepository>,
    pending: Option<Vec<u8>>,
    saved_with: Option<String>,
}

impl InitialSpiAspspConsentDataProvider {
    /// Persist what the SPI wrote under the now known consent id. Only once.
    pub async fn save_with(&mut self, consent_id: &str) -> Result<(), ConsentDataError> {
        if let Some(previous) = &self.saved_with {
            return Err(ConsentDataError::AlreadySaved(previous.clone()));
        }
        if let Some(data) = self.pending.take() {
            self.repository.save(consent_id, data).await?;
        }
        self.saved_with = Some(consent_id.to_string());
        Ok(())
    }
}

impl SpiAspspConsentDataProvider for InitialSpiAspspConsentDataProvider {
    fn load_aspsp_consent_data(&self) -> Option<&[u8]> {
        self.pending.as_deref()
    }

    fn update_aspsp_consent_data(&mut self, data: Vec<u8>) {
        self.pending = Some(data);
    }
}

/// Provider bound to an existing consent.
pub struct BoundSpiAspspConsentDataProvider {
    consent_id: String,
    repository: Arc<dyn AspspConsentDataRepository>,
    current: Option<Vec<u8>>,
    pending: Option<Vec<u8>>,
}

impl BoundSpiAspspConsentDataProvider {
    pub fn consent_id(&self) -> &str {
        &self.consent_id
    }

    /// Persist the SPI's write, if any. Call only after a successful SPI call.
    pub async fn commit(&mut self) -> Result<(), ConsentDataError> {
        if let Some(data) = self.pending.take() {
            self.repository.save(&self.consent_id, data.clone()).await?;
            self.current = Some(data);
        }
        Ok(())
    }

    /// Drop the SPI's write after a failed call.
    pub fn discard(&mut self) {
        self.pending = None;
    }
}

impl SpiAspspConsentDataProvider for BoundSpiAspspConsentDataProvider {
    fn load_aspsp_consent_data(&self) -> Option<&[u8]> {
        self.pending.as_deref().or(self.current.as_deref())
    }

    fn update_aspsp_consent_data(&mut self, data: Vec<u8>) {
        self.pending = Some(data);
    }
}

#[derive(Clone)]
pub struct SpiAspspConsentDataProviderFactory {
    repository: Arc<dyn AspspConsentDataRepository>,
}

impl SpiAspspConsentDataProviderFactory {
    pub fn new(repository: Arc<dyn AspspConsentDataRepository>) -> Self {
        Self { repository }
    }

    pub fn initial_provider(&self) -> InitialSpiAspspConsentDataProvider {
        InitialSpiAspspConsentDataProvider {
            repository: self.repository.clone(),
            pending: None,
            saved_with: None,
        }
    }

    pub async fn provider_for(
        &self,
        consent_id: &str,
    ) -> Result<BoundSpiAspspConsentDataProvider, ConsentDataError> {
        let current = self.repository.load(consent_id).await?;
        Ok(BoundSpiAspspConsentDataProvider {
            consent_id: consent_id.to_string(),
            repository: self.repository.clone(),
            current,
            pending: None,
        })
    }
}
