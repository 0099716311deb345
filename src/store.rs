use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::types::{
    Audit, AuditItem, Control, DataRequest, DataRequestResponse, GrcError, Implementation,
    Notification, Standard, User,
};

/// Redis key prefix for all records
const KEY_PREFIX: &str = "grc:";
/// Redis hash holding dot-path settings
const SETTINGS_KEY: &str = "grc:settings";

/// Record collections, one key namespace each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Users,
    Standards,
    Controls,
    Implementations,
    Audits,
    AuditItems,
    DataRequests,
    Responses,
    Notifications,
}

impl Collection {
    fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Standards => "standard",
            Collection::Controls => "control",
            Collection::Implementations => "implementation",
            Collection::Audits => "audit",
            Collection::AuditItems => "audit_item",
            Collection::DataRequests => "data_request",
            Collection::Responses => "response",
            Collection::Notifications => "notification",
        }
    }
}

/// Record store with Redis backend and in-memory fallback
pub struct GrcStore {
    redis: Option<RwLock<redis::aio::ConnectionManager>>,
    /// JSON records keyed by full record key
    records: RwLock<HashMap<String, String>>,
    /// Secondary indexes (set of ids per index key)
    indexes: RwLock<HashMap<String, BTreeSet<String>>>,
    settings: RwLock<HashMap<String, String>>,
    /// Rejects record writes, to exercise storage failures in tests
    #[cfg(test)]
    read_only: std::sync::atomic::AtomicBool,
}

impl GrcStore {
    /// Create a new store, connecting to Redis if a URL is given
    pub async fn new(redis_url: Option<&str>) -> Self {
        let redis = if let Some(url) = redis_url {
            match Client::open(url) {
                Ok(client) => match client.get_connection_manager().await {
                    Ok(conn) => {
                        info!("Connected to Redis at {}", url);
                        Some(RwLock::new(conn))
                    }
                    Err(e) => {
                        warn!("Failed to connect to Redis: {}. Using in-memory store.", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Invalid Redis URL: {}. Using in-memory store.", e);
                    None
                }
            }
        } else {
            info!("No Redis URL configured. Using in-memory store.");
            None
        };

        Self {
            redis,
            records: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            #[cfg(test)]
            read_only: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Create a new in-memory only store (for testing)
    pub fn in_memory() -> Self {
        Self {
            redis: None,
            records: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            #[cfg(test)]
            read_only: std::sync::atomic::AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_read_only(&self, read_only: bool) {
        self.read_only
            .store(read_only, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if Redis is connected
    pub fn has_redis(&self) -> bool {
        self.redis.is_some()
    }

    fn record_key(collection: Collection, id: &str) -> String {
        format!("{}{}:{}", KEY_PREFIX, collection.as_str(), id)
    }

    fn index_key(name: &str) -> String {
        format!("{}idx:{}", KEY_PREFIX, name)
    }

    // ---------------------------------------------------------------------
    // Generic record / index primitives
    // ---------------------------------------------------------------------

    async fn put<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        record: &T,
    ) -> Result<(), GrcError> {
        #[cfg(test)]
        if self.read_only.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GrcError::Storage("store is read-only".to_string()));
        }

        let key = Self::record_key(collection, id);
        let json = serde_json::to_string(record)?;

        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let _: () = conn.set(&key, &json).await?;
            debug!("Stored {} in Redis", key);
        } else {
            self.records.write().await.insert(key, json);
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, GrcError> {
        let key = Self::record_key(collection, id);

        let json = if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let value: Option<String> = conn.get(&key).await?;
            value
        } else {
            self.records.read().await.get(&key).cloned()
        };

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), GrcError> {
        let key = Self::record_key(collection, id);

        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let _: () = conn.del(&key).await?;
        } else {
            self.records.write().await.remove(&key);
        }
        debug!("Deleted {}", key);
        Ok(())
    }

    async fn index_add(&self, index: &str, member: &str) -> Result<(), GrcError> {
        let key = Self::index_key(index);

        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let _: () = conn.sadd(&key, member).await?;
        } else {
            self.indexes
                .write()
                .await
                .entry(key)
                .or_default()
                .insert(member.to_string());
        }
        Ok(())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<(), GrcError> {
        let key = Self::index_key(index);

        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let _: () = conn.srem(&key, member).await?;
        } else if let Some(set) = self.indexes.write().await.get_mut(&key) {
            set.remove(member);
        }
        Ok(())
    }

    /// Members of an index, sorted
    async fn index_members(&self, index: &str) -> Result<Vec<String>, GrcError> {
        let key = Self::index_key(index);

        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let mut members: Vec<String> = conn.smembers(&key).await?;
            members.sort();
            Ok(members)
        } else {
            Ok(self
                .indexes
                .read()
                .await
                .get(&key)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default())
        }
    }

    /// Load every record listed in an index, skipping dangling ids
    async fn load_index<T: DeserializeOwned>(
        &self,
        collection: Collection,
        index: &str,
    ) -> Result<Vec<T>, GrcError> {
        let mut out = Vec::new();
        for id in self.index_members(index).await? {
            match self.get(collection, &id).await? {
                Some(record) => out.push(record),
                None => warn!("Index {} references missing {} {}", index, collection.as_str(), id),
            }
        }
        Ok(out)
    }

    // ---------------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------------

    pub async fn put_user(&self, user: &User) -> Result<(), GrcError> {
        self.put(Collection::Users, &user.id, user).await?;
        self.index_add("users", &user.id).await
    }

    pub async fn user(&self, id: &str) -> Result<Option<User>, GrcError> {
        self.get(Collection::Users, id).await
    }

    pub async fn users(&self) -> Result<Vec<User>, GrcError> {
        self.load_index(Collection::Users, "users").await
    }

    pub async fn put_standard(&self, standard: &Standard) -> Result<(), GrcError> {
        self.put(Collection::Standards, &standard.id, standard).await
    }

    pub async fn standard(&self, id: &str) -> Result<Option<Standard>, GrcError> {
        self.get(Collection::Standards, id).await
    }

    pub async fn put_control(&self, control: &Control) -> Result<(), GrcError> {
        self.put(Collection::Controls, &control.id, control).await
    }

    pub async fn control(&self, id: &str) -> Result<Option<Control>, GrcError> {
        self.get(Collection::Controls, id).await
    }

    pub async fn put_implementation(&self, implementation: &Implementation) -> Result<(), GrcError> {
        self.put(Collection::Implementations, &implementation.id, implementation)
            .await
    }

    pub async fn implementation(&self, id: &str) -> Result<Option<Implementation>, GrcError> {
        self.get(Collection::Implementations, id).await
    }

    // ---------------------------------------------------------------------
    // Audits and items
    // ---------------------------------------------------------------------

    pub async fn put_audit(&self, audit: &Audit) -> Result<(), GrcError> {
        self.put(Collection::Audits, &audit.id, audit).await
    }

    pub async fn audit(&self, id: &str) -> Result<Option<Audit>, GrcError> {
        self.get(Collection::Audits, id).await
    }

    /// Store a new item and attach it to its audit
    pub async fn add_audit_item(&self, item: &AuditItem) -> Result<(), GrcError> {
        self.put(Collection::AuditItems, &item.id, item).await?;
        self.index_add(&format!("audit:{}:items", item.audit_id), &item.id)
            .await
    }

    /// Persist changes to an existing item
    pub async fn save_audit_item(&self, item: &AuditItem) -> Result<(), GrcError> {
        self.put(Collection::AuditItems, &item.id, item).await
    }

    pub async fn audit_item(&self, id: &str) -> Result<Option<AuditItem>, GrcError> {
        self.get(Collection::AuditItems, id).await
    }

    pub async fn audit_items(&self, audit_id: &str) -> Result<Vec<AuditItem>, GrcError> {
        self.load_index(Collection::AuditItems, &format!("audit:{}:items", audit_id))
            .await
    }

    // ---------------------------------------------------------------------
    // Data requests and responses
    // ---------------------------------------------------------------------

    pub async fn insert_data_request(&self, request: &DataRequest) -> Result<(), GrcError> {
        self.put(Collection::DataRequests, &request.id, request).await?;
        self.index_add(
            &format!("audit_item:{}:requests", request.audit_item_id),
            &request.id,
        )
        .await
    }

    pub async fn remove_data_request(&self, request: &DataRequest) -> Result<(), GrcError> {
        self.index_remove(
            &format!("audit_item:{}:requests", request.audit_item_id),
            &request.id,
        )
        .await?;
        self.delete(Collection::DataRequests, &request.id).await
    }

    pub async fn data_request(&self, id: &str) -> Result<Option<DataRequest>, GrcError> {
        self.get(Collection::DataRequests, id).await
    }

    /// Requests issued for an item, oldest first
    pub async fn data_requests_for_item(
        &self,
        audit_item_id: &str,
    ) -> Result<Vec<DataRequest>, GrcError> {
        let mut requests: Vec<DataRequest> = self
            .load_index(
                Collection::DataRequests,
                &format!("audit_item:{}:requests", audit_item_id),
            )
            .await?;
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    pub async fn insert_response(&self, response: &DataRequestResponse) -> Result<(), GrcError> {
        self.put(Collection::Responses, &response.id, response).await?;
        self.index_add(
            &format!("data_request:{}:responses", response.data_request_id),
            &response.id,
        )
        .await
    }

    pub async fn remove_response(&self, response: &DataRequestResponse) -> Result<(), GrcError> {
        self.index_remove(
            &format!("data_request:{}:responses", response.data_request_id),
            &response.id,
        )
        .await?;
        self.delete(Collection::Responses, &response.id).await
    }

    pub async fn response(&self, id: &str) -> Result<Option<DataRequestResponse>, GrcError> {
        self.get(Collection::Responses, id).await
    }

    pub async fn responses_for_request(
        &self,
        data_request_id: &str,
    ) -> Result<Vec<DataRequestResponse>, GrcError> {
        self.load_index(
            Collection::Responses,
            &format!("data_request:{}:responses", data_request_id),
        )
        .await
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    pub async fn push_notification(&self, notification: &Notification) -> Result<(), GrcError> {
        self.put(Collection::Notifications, &notification.id, notification)
            .await?;
        self.index_add(
            &format!("user:{}:notifications", notification.user_id),
            &notification.id,
        )
        .await
    }

    /// A user's notifications, newest first
    pub async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>, GrcError> {
        let mut notifications: Vec<Notification> = self
            .load_index(
                Collection::Notifications,
                &format!("user:{}:notifications", user_id),
            )
            .await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(notifications)
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    /// Whether any settings have been stored
    pub async fn settings_available(&self) -> Result<bool, GrcError> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let exists: bool = conn.exists(SETTINGS_KEY).await?;
            Ok(exists)
        } else {
            Ok(!self.settings.read().await.is_empty())
        }
    }

    pub async fn setting(&self, key: &str) -> Result<Option<String>, GrcError> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let value: Option<String> = conn.hget(SETTINGS_KEY, key).await?;
            Ok(value)
        } else {
            Ok(self.settings.read().await.get(key).cloned())
        }
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), GrcError> {
        if let Some(redis) = &self.redis {
            let mut conn = redis.write().await;
            let _: () = conn.hset(SETTINGS_KEY, key, value).await?;
        } else {
            self.settings
                .write()
                .await
                .insert(key.to_string(), value.to_string());
        }
        debug!("Stored setting {}", key);
        Ok(())
    }
}
