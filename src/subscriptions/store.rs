//! Subscription storage backends.
//!
//! The host only relies on the save / find / remove contract of
//! [`SubscriptionStore`]. [`JsonSubscriptionStore`] keeps every record in one
//! JSON file, cached in memory and written out on each change.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use super::{Subscription, SubscriptionError};

/// Persistence contract for subscriptions.
pub trait SubscriptionStore: Send {
    /// Insert or replace a record, keyed by its uuid.
    fn save(&mut self, subscription: Subscription) -> Result<(), SubscriptionError>;

    /// Insert or replace several records with a single write.
    fn save_all(&mut self, subscriptions: Vec<Subscription>) -> Result<(), SubscriptionError> {
        for subscription in subscriptions {
            self.save(subscription)?;
        }
        Ok(())
    }

    fn find(&self, uuid: &Uuid) -> Option<Subscription>;

    /// Every record, in insertion order.
    fn find_all(&self) -> Vec<Subscription>;

    /// Remove a record. Returns whether it existed.
    fn remove(&mut self, uuid: &Uuid) -> Result<bool, SubscriptionError>;
}

/// In-memory store, for tests and for hosts without persistence.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    records: Vec<Subscription>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn save(&mut self, subscription: Subscription) -> Result<(), SubscriptionError> {
        upsert(&mut self.records, subscription);
        Ok(())
    }

    fn find(&self, uuid: &Uuid) -> Option<Subscription> {
        self.records.iter().find(|s| s.uuid == *uuid).cloned()
    }

    fn find_all(&self) -> Vec<Subscription> {
        self.records.clone()
    }

    fn remove(&mut self, uuid: &Uuid) -> Result<bool, SubscriptionError> {
        let before = self.records.len();
        self.records.retain(|s| s.uuid != *uuid);
        Ok(self.records.len() != before)
    }
}

/// Store backed by a single JSON file.
pub struct JsonSubscriptionStore {
    /// Path to the storage file.
    path: PathBuf,
    /// In-memory copy of the file.
    cache: Vec<Subscription>,
    /// Whether the cache has uncommitted changes.
    dirty: bool,
}

impl JsonSubscriptionStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts an empty store. An unreadable or corrupt file is
    /// logged and also starts empty; it is only overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let cache = if path.exists() {
            match fs::read_to_string(&path)
                .map_err(SubscriptionError::from)
                .and_then(|contents| Ok(serde_json::from_str::<Vec<Subscription>>(&contents)?))
            {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unable to read subscriptions, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self {
            path,
            cache,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush cached changes to disk.
    pub fn flush(&mut self) -> Result<(), SubscriptionError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&self.cache)?;
        fs::write(&self.path, contents)?;

        self.dirty = false;
        Ok(())
    }
}

impl SubscriptionStore for JsonSubscriptionStore {
    fn save(&mut self, subscription: Subscription) -> Result<(), SubscriptionError> {
        upsert(&mut self.cache, subscription);
        self.dirty = true;
        self.flush()
    }

    fn save_all(&mut self, subscriptions: Vec<Subscription>) -> Result<(), SubscriptionError> {
        for subscription in subscriptions {
            upsert(&mut self.cache, subscription);
        }
        self.dirty = true;
        self.flush()
    }

    fn find(&self, uuid: &Uuid) -> Option<Subscription> {
        self.cache.iter().find(|s| s.uuid == *uuid).cloned()
    }

    fn find_all(&self) -> Vec<Subscription> {
        self.cache.clone()
    }

    fn remove(&mut self, uuid: &Uuid) -> Result<bool, SubscriptionError> {
        let before = self.cache.len();
        self.cache.retain(|s| s.uuid != *uuid);
        if self.cache.len() == before {
            return Ok(false);
        }
        self.dirty = true;
        self.flush()?;
        Ok(true)
    }
}

impl Drop for JsonSubscriptionStore {
    fn drop(&mut self) {
        // Best-effort flush on drop
        let _ = self.flush();
    }
}

impl std::fmt::Debug for JsonSubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSubscriptionStore")
            .field("path", &self.path)
            .field("records", &self.cache.len())
            .finish()
    }
}

fn upsert(records: &mut Vec<Subscription>, subscription: Subscription) {
    match records.iter_mut().find(|s| s.uuid == subscription.uuid) {
        Some(existing) => *existing = subscription,
        None => records.push(subscription),
    }
}
