use super::{AspspConsentDataRepository, ConsentRepository, StoreError, StoreResult};
use crate::models::{
    AccountAccess, AisConsent, Authorisation, ConsentStatus, CreateConsentRequest, PsuIdData,
    TppInfo,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct MongoConsentRepository {
    db: Database,
    consent_collection: Collection<AisConsent>,
    authorisation_collection: Collection<Authorisation>,
}

impl MongoConsentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            consent_collection: db.collection("ais_consents"),
            authorisation_collection: db.collection("ais_authorisations"),
        }
    }

    pub async fn init_indexes(&self) -> StoreResult<()> {
        let tpp_index = IndexModel::builder()
            .keys(doc! { "tpp.authorisation_number": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("tpp_consent_status_idx".to_string())
                    .build(),
            )
            .build();

        self.consent_collection
            .create_indexes([tpp_index], None)
            .await?;

        let consent_auth_index = IndexModel::builder()
            .keys(doc! { "consent_id": 1, "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("consent_authorisation_idx".to_string())
                    .build(),
            )
            .build();

        self.authorisation_collection
            .create_indexes([consent_auth_index], None)
            .await?;

        tracing::info!("Consent store indexes initialized");
        Ok(())
    }
}

#[async_trait]
impl ConsentRepository for MongoConsentRepository {
    async fn create_consent(
        &self,
        request: &CreateConsentRequest,
        psu: &PsuIdData,
        tpp: &TppInfo,
    ) -> StoreResult<AisConsent> {
        let consent = AisConsent::new(Uuid::new_v4().to_string(), request, psu, tpp, Utc::now());
        self.consent_collection.insert_one(&consent, None).await?;
        Ok(consent)
    }

    async fn get_consent_by_id(&self, consent_id: &str) -> StoreResult<Option<AisConsent>> {
        let filter = doc! { "_id": consent_id };
        Ok(self.consent_collection.find_one(filter, None).await?)
    }

    async fn update_consent_status(
        &self,
        consent_id: &str,
        status: ConsentStatus,
    ) -> StoreResult<()> {
        let filter = doc! { "_id": consent_id };
        let update = doc! {
            "$set": {
                "status": mongodb::bson::to_bson(&status)?,
                "status_change_timestamp": mongodb::bson::to_bson(&Utc::now())?
            }
        };
        self.consent_collection
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn update_multilevel_sca_required(
        &self,
        consent_id: &str,
        multilevel_sca_required: bool,
    ) -> StoreResult<()> {
        let filter = doc! { "_id": consent_id };
        let update = doc! { "$set": { "multilevel_sca_required": multilevel_sca_required } };
        self.consent_collection
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn update_aspsp_account_access(
        &self,
        consent_id: &str,
        access: &AccountAccess,
    ) -> StoreResult<()> {
        let filter = doc! { "_id": consent_id };
        let update = doc! { "$set": { "aspsp_access": mongodb::bson::to_bson(access)? } };
        self.consent_collection
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn add_psu_data(&self, consent_id: &str, psu: &PsuIdData) -> StoreResult<()> {
        let filter = doc! { "_id": consent_id };
        let update = doc! { "$addToSet": { "psu_data": mongodb::bson::to_bson(psu)? } };
        self.consent_collection
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn create_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()> {
        self.authorisation_collection
            .insert_one(authorisation, None)
            .await?;
        Ok(())
    }

    async fn get_authorisation_by_id(
        &self,
        authorisation_id: &str,
    ) -> StoreResult<Option<Authorisation>> {
        let filter = doc! { "_id": authorisation_id };
        Ok(self.authorisation_collection.find_one(filter, None).await?)
    }

    async fn get_authorisations_by_consent_id(
        &self,
        consent_id: &str,
    ) -> StoreResult<Vec<Authorisation>> {
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();
        let cursor = self
            .authorisation_collection
            .find(doc! { "consent_id": consent_id }, Some(options))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_authorisation(&self, authorisation: &Authorisation) -> StoreResult<()> {
        let filter = doc! { "_id": authorisation.id.as_str() };
        self.authorisation_collection
            .replace_one(filter, authorisation, None)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AspspConsentDataDocument {
    #[serde(rename = "_id")]
    consent_id: String,
    data: String,
}

#[derive(Clone)]
pub struct MongoAspspConsentDataRepository {
    collection: Collection<AspspConsentDataDocument>,
}

impl MongoAspspConsentDataRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("aspsp_consent_data"),
        }
    }
}

#[async_trait]
impl AspspConsentDataRepository for MongoAspspConsentDataRepository {
    async fn load(&self, consent_id: &str) -> StoreResult<Option<Vec<u8>>> {
        let document = self
            .collection
            .find_one(doc! { "_id": consent_id }, None)
            .await?;

        document
            .map(|d| {
                STANDARD
                    .decode(d.data)
                    .map_err(|e| StoreError::Corrupt(format!("bank context of {consent_id}: {e}")))
            })
            .transpose()
    }

    async fn save(&self, consent_id: &str, data: Vec<u8>) -> StoreResult<()> {
        let filter = doc! { "_id": consent_id };
        let update = doc! { "$set": { "data": STANDARD.encode(data) } };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();
        self.collection.update_one(filter, update, options).await?;
        Ok(())
    }
}
