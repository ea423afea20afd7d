//! Flat key-value fallback storage.
//!
//! Used when no bookmark substrate is available (e.g. outside an
//! extension context). The whole collection lives as one serialized
//! value under a well-known key; ids are generated locally. There is no
//! external event feed here, so change callbacks fire after this store's
//! own successful mutations.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::records::{ProductRecord, WishlistEntry};
use crate::sync_bridge::ChangeCallback;

/// Key holding the serialized wishlist collection.
pub const STORAGE_KEY: &str = "wishlist";

/// Flat string-keyed persistent store, scoped to the consumer.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// `KeyValueStore` over a single JSON file holding a string map.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read storage file {:?}", self.path))?;
        serde_json::from_str(&data).context("Storage file is not a valid string map")
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().expect("storage lock poisoned");
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        let data = serde_json::to_string_pretty(&map)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write storage file {:?}", self.path))?;
        Ok(())
    }
}

type ListenerMap = Arc<Mutex<HashMap<u64, ChangeCallback>>>;

/// Guard for a fallback-store change subscription. Dropping it removes
/// the registration.
pub struct FallbackWatch {
    listeners: ListenerMap,
    id: Option<u64>,
}

impl FallbackWatch {
    pub fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.listeners
                .lock()
                .expect("listener map poisoned")
                .remove(&id);
        }
    }
}

impl Drop for FallbackWatch {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Wishlist persistence over a flat key-value store.
pub struct FallbackStore {
    kv: Arc<dyn KeyValueStore>,
    listeners: ListenerMap,
    next_listener_id: Mutex<u64>,
}

impl FallbackStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: Mutex::new(0),
        }
    }

    fn load(&self) -> Result<Vec<WishlistEntry>> {
        let Some(raw) = self.kv.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A mangled collection loses its contents but must not
                // take the store down with it.
                warn!("⚠️  Stored wishlist is unreadable ({}), starting empty", e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[WishlistEntry]) -> Result<()> {
        let data = serde_json::to_string(entries)?;
        self.kv.set(STORAGE_KEY, &data)
    }

    fn notify(&self) {
        let callbacks: Vec<ChangeCallback> = {
            let listeners = self.listeners.lock().expect("listener map poisoned");
            listeners.values().cloned().collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub async fn list(&self) -> Result<Vec<WishlistEntry>> {
        self.load()
    }

    pub async fn add(&self, record: &ProductRecord) -> Result<WishlistEntry> {
        let entry = WishlistEntry {
            id: Uuid::new_v4().to_string(),
            title: record.title.clone(),
            price: record.price.clone(),
            image_url: record.image_url.clone(),
            vendor: record.vendor.clone(),
            url: record.url.clone(),
            date_added: chrono::Utc::now().timestamp_millis(),
        };

        let mut entries = self.load()?;
        entries.push(entry.clone());
        self.save(&entries)?;
        debug!("Added fallback wishlist entry {}", entry.id);

        self.notify();
        Ok(entry)
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let entries = self.load()?;
        let before = entries.len();
        let remaining: Vec<WishlistEntry> =
            entries.into_iter().filter(|e| e.id != id).collect();

        if remaining.len() == before {
            warn!("⚠️  Wishlist entry {} not found, nothing removed", id);
            return Ok(());
        }

        self.save(&remaining)?;
        debug!("Removed fallback wishlist entry {}", id);
        self.notify();
        Ok(())
    }

    pub fn watch(&self, on_change: ChangeCallback) -> FallbackWatch {
        let mut next = self.next_listener_id.lock().expect("listener id poisoned");
        let id = *next;
        *next += 1;
        self.listeners
            .lock()
            .expect("listener map poisoned")
            .insert(id, on_change);
        FallbackWatch {
            listeners: self.listeners.clone(),
            id: Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lamp() -> ProductRecord {
        ProductRecord {
            title: "Lamp".to_string(),
            price: Some("$49.99".to_string()),
            image_url: None,
            vendor: Some("ikea.com".to_string()),
            url: "https://ikea.com/lamp".to_string(),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> FallbackStore {
        let kv = JsonFileStore::open(dir.path().join("storage.json")).unwrap();
        FallbackStore::new(Arc::new(kv))
    }

    #[tokio::test]
    async fn add_generates_id_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let entry = store.add(&lamp()).await.unwrap();
        assert!(!entry.id.is_empty());
        assert!(entry.date_added > 0);
        assert_eq!(entry.url, "https://ikea.com/lamp");

        let other = store.add(&lamp()).await.unwrap();
        assert_ne!(entry.id, other.id);
    }

    #[tokio::test]
    async fn remove_filters_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let a = store.add(&lamp()).await.unwrap();
        let b = store.add(&lamp()).await.unwrap();

        store.remove(&a.id).await.unwrap();
        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, b.id);

        // Unknown id is a no-op
        store.remove("not-an-id").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn collection_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let added = {
            let kv = JsonFileStore::open(&path).unwrap();
            let store = FallbackStore::new(Arc::new(kv));
            store.add(&lamp()).await.unwrap()
        };

        let kv = JsonFileStore::open(&path).unwrap();
        let store = FallbackStore::new(Arc::new(kv));
        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], added);
    }

    #[tokio::test]
    async fn unreadable_collection_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonFileStore::open(dir.path().join("storage.json")).unwrap();
        kv.set(STORAGE_KEY, "certainly not a wishlist").unwrap();

        let store = FallbackStore::new(Arc::new(kv));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutations_notify_watchers_until_detached() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let mut watch = store.watch(Arc::new(move || {
            f.fetch_add(1, Ordering::SeqCst);
        }));

        let entry = store.add(&lamp()).await.unwrap();
        store.remove(&entry.id).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        watch.detach();
        store.add(&lamp()).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
