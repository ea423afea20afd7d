//! Unified wishlist front over the two persistence paths.
//!
//! The backend is picked once, when the wishlist is opened, and never
//! changes mid-session: the bookmark substrate when one is available,
//! the flat key-value fallback otherwise.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::fallback::{FallbackStore, FallbackWatch, KeyValueStore};
use crate::records::{ProductRecord, WishlistEntry};
use crate::store::WishlistStore;
use crate::substrate::BookmarkSubstrate;
use crate::sync_bridge::{ChangeCallback, SyncBridge};

/// Active change subscription for either backend.
pub enum ChangeGuard {
    Bookmarks(SyncBridge),
    Flat(FallbackWatch),
}

impl ChangeGuard {
    pub fn detach(&mut self) {
        match self {
            ChangeGuard::Bookmarks(bridge) => bridge.detach(),
            ChangeGuard::Flat(watch) => watch.detach(),
        }
    }
}

/// A wishlist bound to whichever persistence path was available at open
/// time.
pub enum Wishlist {
    Bookmarks(WishlistStore),
    Flat(FallbackStore),
}

impl Wishlist {
    pub fn open(
        substrate: Option<Arc<dyn BookmarkSubstrate>>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        match substrate {
            Some(substrate) => {
                info!("📚 Wishlist backed by bookmark substrate");
                Wishlist::Bookmarks(WishlistStore::new(substrate))
            }
            None => {
                info!("📦 Bookmark substrate unavailable, using flat storage");
                Wishlist::Flat(FallbackStore::new(kv))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<WishlistEntry>> {
        match self {
            Wishlist::Bookmarks(store) => store.list().await,
            Wishlist::Flat(store) => store.list().await,
        }
    }

    pub async fn add(&self, record: &ProductRecord) -> Result<WishlistEntry> {
        match self {
            Wishlist::Bookmarks(store) => store.add(record).await,
            Wishlist::Flat(store) => store.add(record).await,
        }
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        match self {
            Wishlist::Bookmarks(store) => store.remove(id).await,
            Wishlist::Flat(store) => store.remove(id).await,
        }
    }

    pub fn watch(&self, on_change: ChangeCallback) -> ChangeGuard {
        match self {
            Wishlist::Bookmarks(store) => ChangeGuard::Bookmarks(store.watch(on_change)),
            Wishlist::Flat(store) => ChangeGuard::Flat(store.watch(on_change)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::JsonFileStore;
    use crate::local_bookmarks::LocalBookmarkFile;
    use crate::store::FOLDER_NAME;

    fn lamp() -> ProductRecord {
        ProductRecord {
            title: "Lamp".to_string(),
            price: Some("$49.99".to_string()),
            image_url: None,
            vendor: Some("ikea.com".to_string()),
            url: "https://ikea.com/lamp".to_string(),
        }
    }

    #[tokio::test]
    async fn open_prefers_the_substrate() {
        let dir = tempfile::tempdir().unwrap();
        let substrate: Arc<dyn BookmarkSubstrate> =
            Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());
        let kv = Arc::new(JsonFileStore::open(dir.path().join("storage.json")).unwrap());

        let wishlist = Wishlist::open(Some(substrate.clone()), kv);
        wishlist.add(&lamp()).await.unwrap();

        // The entry landed in the bookmark tree, not the flat file
        let folders = substrate.search(FOLDER_NAME).await.unwrap();
        assert_eq!(folders.len(), 1);
        let children = substrate.children(&folders[0].id).await.unwrap();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn open_without_substrate_uses_flat_storage() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(JsonFileStore::open(dir.path().join("storage.json")).unwrap());

        let wishlist = Wishlist::open(None, kv);
        let added = wishlist.add(&lamp()).await.unwrap();

        let entries = wishlist.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, added.id);

        wishlist.remove(&added.id).await.unwrap();
        assert!(wishlist.list().await.unwrap().is_empty());
    }
}
