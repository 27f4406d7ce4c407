//! Event entry store: one document per participating member.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

const ENTRIES_COLLECTION: &str = "entries";

/// A recorded entry, enriched with the member's customer record at the time
/// of submission. Platform fields are stored as trimmed strings; the platform
/// mixes strings, numbers and booleans for the same field across malls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(rename = "memberId")]
    pub member_id: String,
    pub cellphone: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
    pub shop_no: String,
    pub group_no: String,
    pub member_authentication: String,
    pub use_blacklist: String,
    pub blacklist_type: String,
    pub authentication_method: String,
    pub sms: String,
    pub news_mail: String,
    pub solar_calendar: String,
    pub total_points: String,
    pub available_points: String,
    pub used_points: String,
    pub last_login_date: String,
    pub created_date: String,
    pub gender: String,
    pub use_mobile_app: String,
    pub available_credits: String,
    pub fixed_group: String,
}

impl EntryRecord {
    /// Build an enriched entry from the platform's customer privacy payload.
    ///
    /// A cellphone supplied with the submission wins over the customer
    /// record's phone; fields the platform omits become empty strings.
    pub fn enriched(member_id: &str, cellphone: Option<&str>, customer: &Value) -> Self {
        Self {
            member_id: member_id.to_string(),
            cellphone: cellphone
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| field_str(customer, "phone")),
            name: field_str(customer, "name"),
            created_at: DateTime::now(),
            shop_no: field_str(customer, "shop_no"),
            group_no: field_str(customer, "group_no"),
            member_authentication: field_str(customer, "member_authentication"),
            use_blacklist: field_str(customer, "use_blacklist"),
            blacklist_type: field_str(customer, "blacklist_type"),
            authentication_method: field_str(customer, "authentication_method"),
            sms: field_str(customer, "sms"),
            news_mail: field_str(customer, "news_mail"),
            solar_calendar: field_str(customer, "solar_calendar"),
            total_points: field_str(customer, "total_points"),
            available_points: field_str(customer, "available_points"),
            used_points: field_str(customer, "used_points"),
            last_login_date: field_str(customer, "last_login_date"),
            created_date: field_str(customer, "created_date"),
            gender: field_str(customer, "gender"),
            use_mobile_app: field_str(customer, "use_mobile_app"),
            available_credits: field_str(customer, "available_credits"),
            fixed_group: field_str(customer, "fixed_group"),
        }
    }

    /// JSON view for API responses, with the timestamp rendered as RFC 3339
    /// instead of the extended-JSON date object.
    pub fn response_json(&self) -> Result<Value, ApiError> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| ApiError::Internal(format!("entry serialization failed: {e}")))?;
        if let Some(object) = value.as_object_mut() {
            let created = self
                .created_at
                .try_to_rfc3339_string()
                .map_err(|e| ApiError::Internal(format!("entry timestamp invalid: {e}")))?;
            object.insert("createdAt".to_string(), Value::String(created));
        }
        Ok(value)
    }
}

/// String field from a JSON object. Strings are trimmed, numbers and
/// booleans are stringified, anything else reads as empty.
fn field_str(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Durable home of recorded entries. Sits behind a trait so the route
/// handlers can be driven against an in-memory double.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Whether the member already has an entry on record.
    async fn exists(&self, member_id: &str) -> Result<bool, ApiError>;

    /// Insert one entry and return its id.
    async fn insert(&self, entry: &EntryRecord) -> Result<String, ApiError>;

    async fn count(&self) -> Result<u64, ApiError>;

    /// Every recorded entry, in insertion order.
    async fn all(&self) -> Result<Vec<EntryRecord>, ApiError>;
}

/// Entry store backed by MongoDB. Unlike the token store this holds its
/// client for the life of the process; entry traffic is the hot path.
#[derive(Clone)]
pub struct MongoEntryStore {
    client: Client,
    db_name: String,
}

impl MongoEntryStore {
    /// Connect and ping, so a bad URI fails startup instead of the first
    /// request.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, ApiError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| ApiError::Storage(format!("entry store connect failed: {e}")))?;
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn collection(&self) -> Collection<EntryRecord> {
        self.client
            .database(&self.db_name)
            .collection(ENTRIES_COLLECTION)
    }
}

#[async_trait]
impl EntryStore for MongoEntryStore {
    async fn exists(&self, member_id: &str) -> Result<bool, ApiError> {
        let found = self
            .collection()
            .find_one(doc! { "memberId": member_id })
            .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, entry: &EntryRecord) -> Result<String, ApiError> {
        let result = self.collection().insert_one(entry).await?;
        let id = result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .unwrap_or_else(|| result.inserted_id.to_string());
        Ok(id)
    }

    async fn count(&self) -> Result<u64, ApiError> {
        let count = self.collection().count_documents(doc! {}).await?;
        Ok(count)
    }

    async fn all(&self) -> Result<Vec<EntryRecord>, ApiError> {
        let mut cursor = self.collection().find(doc! {}).await?;
        let mut entries = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory entry store double for handler tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct MemoryEntryStore {
        entries: Mutex<Vec<EntryRecord>>,
    }

    impl MemoryEntryStore {
        pub(crate) fn empty() -> Self {
            Self::default()
        }

        /// Pre-record an entry for `member_id`.
        pub(crate) fn with_member(member_id: &str) -> Self {
            let store = Self::default();
            store.entries.lock().unwrap().push(EntryRecord::enriched(
                member_id,
                None,
                &serde_json::json!({}),
            ));
            store
        }

        pub(crate) fn recorded(&self) -> Vec<EntryRecord> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EntryStore for MemoryEntryStore {
        async fn exists(&self, member_id: &str) -> Result<bool, ApiError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.member_id == member_id))
        }

        async fn insert(&self, entry: &EntryRecord) -> Result<String, ApiError> {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry.clone());
            Ok(format!("mem-{}", entries.len()))
        }

        async fn count(&self) -> Result<u64, ApiError> {
            Ok(self.entries.lock().unwrap().len() as u64)
        }

        async fn all(&self) -> Result<Vec<EntryRecord>, ApiError> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }
}
