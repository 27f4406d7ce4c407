//! Token store: MongoDB-backed singleton for the Cafe24 OAuth token pair.
//!
//! One record per deployment, upserted in place by the refresh protocol and
//! never deleted. Connections are scoped to each call: opened, used, and
//! released on every exit path, so nothing is held between calls.

use async_trait::async_trait;
use mongodb::bson::{doc, DateTime};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Fixed key of the singleton token record.
pub const TOKEN_RECORD_NAME: &str = "cafe24Tokens";

/// The persisted token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub name: String,
    pub access_token: String,
    pub refresh_token: String,
    pub updated_at: DateTime,
}

/// Durable home of the singleton token pair.
///
/// `load` answering `None` means "never initialized"; it is not an error.
/// The in-process copy of the pair is a cache of this record and can be stale
/// if another process refreshed concurrently.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<TokenRecord>, ApiError>;

    /// Upsert the singleton record with a fresh `updatedAt`. Single write
    /// operation; no partial state is ever visible.
    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError>;
}

/// Token store backed by MongoDB.
pub struct MongoTokenStore {
    uri: String,
    db_name: String,
    collection: String,
}

impl MongoTokenStore {
    pub fn new(uri: &str, db_name: &str, collection: &str) -> Self {
        Self {
            uri: uri.to_string(),
            db_name: db_name.to_string(),
            collection: collection.to_string(),
        }
    }

    /// Fresh client per call; dropping the handles releases the connection.
    async fn collection(&self) -> Result<Collection<TokenRecord>, ApiError> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| ApiError::Storage(format!("token store connect failed: {e}")))?;
        Ok(client.database(&self.db_name).collection(&self.collection))
    }
}

#[async_trait]
impl TokenStore for MongoTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, ApiError> {
        let collection = self.collection().await?;
        let record = collection
            .find_one(doc! { "name": TOKEN_RECORD_NAME })
            .await?;
        Ok(record)
    }

    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError> {
        let collection = self.collection().await?;
        collection
            .update_one(
                doc! { "name": TOKEN_RECORD_NAME },
                doc! {
                    "$set": {
                        "name": TOKEN_RECORD_NAME,
                        "accessToken": access_token,
                        "refreshToken": refresh_token,
                        "updatedAt": DateTime::now(),
                    }
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_record_keeps_the_persisted_field_names() {
        let record = TokenRecord {
            name: TOKEN_RECORD_NAME.to_string(),
            access_token: "A1".into(),
            refresh_token: "R1".into(),
            updated_at: DateTime::now(),
        };

        let doc = mongodb::bson::to_document(&record).unwrap();
        assert_eq!(doc.get_str("name").unwrap(), "cafe24Tokens");
        assert_eq!(doc.get_str("accessToken").unwrap(), "A1");
        assert_eq!(doc.get_str("refreshToken").unwrap(), "R1");
        assert!(doc.get_datetime("updatedAt").is_ok());
    }

    #[tokio::test]
    async fn memory_store_is_absent_until_first_save() {
        let store = testing::MemoryTokenStore::empty();
        assert!(store.load().await.unwrap().is_none());

        store.save("A1", "R1").await.unwrap();
        let record = store.load().await.unwrap().unwrap();
        assert_eq!(record.access_token, "A1");
        assert_eq!(record.refresh_token, "R1");
        assert_eq!(store.save_count(), 1);
    }
}
