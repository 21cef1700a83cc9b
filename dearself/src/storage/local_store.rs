//! Local key/value store
//!
//! One JSON document per key, backed by the `kv_store` table. Reads never
//! fail: a missing or unparseable value yields the caller's fallback. Writes
//! never fail either: when the database rejects a write the value is kept in
//! an in-memory overlay so the rest of the session still sees it.
//!
//! Every write or removal is published on a broadcast channel so open views
//! can reload. A platform bridge that notices writes from another process
//! calls [`LocalStore::dispatch_external`] to re-publish them.
//!
//! Services that read a document, change it and write it back hold the
//! key's lock ([`LocalStore::lock_key`] or [`LocalStore::update`]) for the
//! whole sequence, so concurrent tasks never overwrite each other's changes.

use crate::database::{create_memory_pool, Repository};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store
    Local,
    /// Written by another process and re-dispatched by a bridge
    External,
}

/// Notification published after a key changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub origin: ChangeOrigin,
}

impl StoreChange {
    pub fn is_for(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Key/value store handle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LocalStore {
    repo: Repository,
    /// Values whose last write did not reach the database. `None` marks a
    /// removal that did not reach it.
    overlay: Arc<RwLock<HashMap<String, Option<String>>>>,
    changes: broadcast::Sender<StoreChange>,
    /// One mutation lock per key, created on first use
    key_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl LocalStore {
    pub fn new(repo: Repository) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            repo,
            overlay: Arc::new(RwLock::new(HashMap::new())),
            changes,
            key_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store backed by a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(Repository::new(create_memory_pool().await?)))
    }

    /// Read the raw text stored for a key
    pub async fn read_raw(&self, key: &str) -> Option<String> {
        if let Some(pending) = self.overlay.read().await.get(key) {
            return pending.clone();
        }

        match self.repo.get_value(key).await {
            Ok(row) => row.map(|r| r.value),
            Err(e) => {
                tracing::warn!("Failed to read key {}: {}", key, e);
                None
            }
        }
    }

    /// Read and parse a key, or return `fallback` when it is missing or
    /// does not parse as `T`.
    pub async fn read<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(raw) = self.read_raw(key).await else {
            return fallback;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring unparseable value for key {}: {}", key, e);
                fallback
            }
        }
    }

    /// Store raw text for a key
    pub async fn write_raw(&self, key: &str, raw: String) {
        match self.repo.put_value(key, &raw).await {
            Ok(_) => {
                self.overlay.write().await.remove(key);
            }
            Err(e) => {
                tracing::warn!("Write for key {} kept in memory only: {}", key, e);
                self.overlay.write().await.insert(key.to_string(), Some(raw));
            }
        }

        self.publish(key, ChangeOrigin::Local);
    }

    /// Serialize and store a value
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write_raw(key, raw).await,
            Err(e) => tracing::warn!("Failed to serialize value for key {}: {}", key, e),
        }
    }

    /// Remove a key
    pub async fn remove(&self, key: &str) {
        match self.repo.delete_value(key).await {
            Ok(_) => {
                self.overlay.write().await.remove(key);
            }
            Err(e) => {
                tracing::warn!("Removal of key {} kept in memory only: {}", key, e);
                self.overlay.write().await.insert(key.to_string(), None);
            }
        }

        self.publish(key, ChangeOrigin::Local);
    }

    /// Exclusive access to a key until the guard is dropped. Plain reads
    /// and writes do not take it; only read-modify-write sequences do.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .key_locks
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Read a key, let `change` modify it and write it back, all under the
    /// key's lock. Returns what `change` returned.
    pub async fn update<T, R>(&self, key: &str, fallback: T, change: impl FnOnce(&mut T) -> R) -> R
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.lock_key(key).await;
        let mut value = self.read(key, fallback).await;
        let result = change(&mut value);
        self.write(key, &value).await;
        result
    }

    /// Whether some values only live in memory for this session
    pub async fn is_degraded(&self) -> bool {
        !self.overlay.read().await.is_empty()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Re-publish a change made by another process
    pub fn dispatch_external(&self, key: &str) {
        self.publish(key, ChangeOrigin::External);
    }

    fn publish(&self, key: &str, origin: ChangeOrigin) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            origin,
        });
    }
}
