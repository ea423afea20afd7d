//! Bookmark-backed wishlist store.
//!
//! Layers structured, change-notified wishlist entries on top of the flat
//! folder-of-bookmarks substrate. The substrate's only free-text field is
//! the node title, so the product metadata travels there as a versioned
//! JSON blob while the product URL occupies the native link field.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::records::{ProductRecord, WishlistEntry};
use crate::substrate::{BookmarkNode, BookmarkSubstrate, BOOKMARK_BAR_ID};
use crate::sync_bridge::{ChangeCallback, SyncBridge};

/// Well-known name of the singleton wishlist folder.
pub const FOLDER_NAME: &str = "Shopping Wishlist";

const ENCODING_VERSION: u32 = 1;

/// Outcome of a folder resolution pass.
///
/// `orphaned` counts extra same-named folders left behind by manual
/// bookmark edits. They are never merged or deleted; first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderResolution {
    pub folder_id: String,
    pub orphaned: usize,
}

/// Metadata blob stored in the bookmark title field.
///
/// Decoding tolerates blobs from older writers: a missing `v` and any
/// unknown fields (legacy blobs also embedded the URL) are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleBlob {
    #[serde(rename = "v", default)]
    version: u32,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vendor: Option<String>,
}

fn encode_record(record: &ProductRecord) -> Result<String> {
    let blob = TitleBlob {
        version: ENCODING_VERSION,
        title: record.title.clone(),
        price: record.price.clone(),
        image_url: record.image_url.clone(),
        vendor: record.vendor.clone(),
    };
    serde_json::to_string(&blob).context("Failed to encode wishlist entry")
}

/// Map a substrate child node to an entry. A title that does not decode
/// as a blob is kept verbatim as the entry title; a malformed node is
/// never an error.
fn entry_from_node(node: &BookmarkNode) -> WishlistEntry {
    let date_added = node
        .date_added
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let url = node.url.clone().unwrap_or_default();

    match serde_json::from_str::<TitleBlob>(&node.title) {
        Ok(blob) => WishlistEntry {
            id: node.id.clone(),
            title: blob.title,
            price: blob.price,
            image_url: blob.image_url,
            vendor: blob.vendor,
            url,
            date_added,
        },
        Err(e) => {
            debug!("Bookmark {} has a non-blob title ({}), keeping raw", node.id, e);
            WishlistEntry {
                id: node.id.clone(),
                title: node.title.clone(),
                price: None,
                image_url: None,
                vendor: None,
                url,
                date_added,
            }
        }
    }
}

/// The structured wishlist view over a bookmark substrate.
pub struct WishlistStore {
    substrate: Arc<dyn BookmarkSubstrate>,
}

impl WishlistStore {
    pub fn new(substrate: Arc<dyn BookmarkSubstrate>) -> Self {
        Self { substrate }
    }

    /// Locate the wishlist folder, creating or relocating it as needed.
    ///
    /// Re-run on every read and write: the substrate can be edited by
    /// anyone at any time, so a cached id could go stale.
    pub async fn resolve_folder(&self) -> Result<FolderResolution> {
        let matches = self.substrate.search(FOLDER_NAME).await?;
        let folders: Vec<BookmarkNode> = matches.into_iter().filter(|n| n.folder).collect();

        let Some((first, rest)) = folders.split_first() else {
            let created = self
                .substrate
                .create(BOOKMARK_BAR_ID, FOLDER_NAME, None)
                .await
                .context("Failed to create wishlist folder")?;
            debug!("Created wishlist folder {}", created.id);
            return Ok(FolderResolution {
                folder_id: created.id,
                orphaned: 0,
            });
        };

        if !rest.is_empty() {
            warn!(
                "⚠️  Found {} duplicate wishlist folders, using {} (first match)",
                rest.len(),
                first.id
            );
        }

        let folder_id = if first.parent_id.as_deref() != Some(BOOKMARK_BAR_ID) {
            debug!("Relocating wishlist folder {} to bookmark bar", first.id);
            let moved = self
                .substrate
                .move_node(&first.id, BOOKMARK_BAR_ID)
                .await
                .context("Failed to relocate wishlist folder")?;
            moved.id
        } else {
            first.id.clone()
        };

        Ok(FolderResolution {
            folder_id,
            orphaned: rest.len(),
        })
    }

    /// All entries in substrate order. No sorting here; presentation
    /// order is the consumer's concern.
    pub async fn list(&self) -> Result<Vec<WishlistEntry>> {
        let folder = self.resolve_folder().await?;
        let children = self.substrate.children(&folder.folder_id).await?;

        Ok(children
            .iter()
            .filter(|node| !node.folder)
            .map(entry_from_node)
            .collect())
    }

    /// Persist a product record as a new wishlist entry.
    ///
    /// No URL dedupe: adding the same product twice yields two entries.
    pub async fn add(&self, record: &ProductRecord) -> Result<WishlistEntry> {
        let folder = self.resolve_folder().await?;
        let blob = encode_record(record)?;
        let node = self
            .substrate
            .create(&folder.folder_id, &blob, Some(&record.url))
            .await
            .context("Failed to add wishlist entry")?;

        debug!("Added wishlist entry {} for {}", node.id, record.url);
        Ok(entry_from_node(&node))
    }

    /// Remove an entry by id. Removing an id that no longer exists is a
    /// logged no-op; the folder is never touched.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let removed = self
            .substrate
            .remove(id)
            .await
            .context("Failed to remove wishlist entry")?;
        if !removed {
            warn!("⚠️  Wishlist entry {} not found, nothing removed", id);
        }
        Ok(())
    }

    /// Subscribe to substrate changes. The callback means "something
    /// changed, re-run `list`"; no diffing is performed.
    pub fn watch(&self, on_change: ChangeCallback) -> SyncBridge {
        SyncBridge::attach(self.substrate.clone(), on_change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_bookmarks::LocalBookmarkFile;
    use proptest::prelude::*;

    fn lamp() -> ProductRecord {
        ProductRecord {
            title: "Lamp".to_string(),
            price: Some("$49.99".to_string()),
            image_url: Some("https://ikea.com/lamp.jpg".to_string()),
            vendor: Some("ikea.com".to_string()),
            url: "https://ikea.com/lamp".to_string(),
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> WishlistStore {
        let substrate = LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap();
        WishlistStore::new(Arc::new(substrate))
    }

    #[test]
    fn blob_round_trips_all_fields() {
        let record = lamp();
        let blob = encode_record(&record).unwrap();
        let node = BookmarkNode {
            id: "7".to_string(),
            parent_id: Some("3".to_string()),
            title: blob,
            url: Some(record.url.clone()),
            folder: false,
            date_added: Some(1700000000000),
        };

        let entry = entry_from_node(&node);
        assert_eq!(entry.record(), record);
        assert_eq!(entry.date_added, 1700000000000);
    }

    #[test]
    fn blob_round_trips_absent_fields() {
        let record = ProductRecord {
            title: "Plain".to_string(),
            price: None,
            image_url: None,
            vendor: None,
            url: "https://example.com/p/1".to_string(),
        };
        let blob = encode_record(&record).unwrap();
        assert!(!blob.contains("undefined"));

        let node = BookmarkNode {
            id: "7".to_string(),
            parent_id: None,
            title: blob,
            url: Some(record.url.clone()),
            folder: false,
            date_added: Some(1),
        };
        assert_eq!(entry_from_node(&node).record(), record);
    }

    #[test]
    fn malformed_title_becomes_plain_entry() {
        let node = BookmarkNode {
            id: "9".to_string(),
            parent_id: None,
            title: "Just a bookmark someone made by hand".to_string(),
            url: Some("https://example.com".to_string()),
            folder: false,
            date_added: Some(5),
        };

        let entry = entry_from_node(&node);
        assert_eq!(entry.title, "Just a bookmark someone made by hand");
        assert_eq!(entry.price, None);
        assert_eq!(entry.image_url, None);
        assert_eq!(entry.vendor, None);
        assert_eq!(entry.url, "https://example.com");
    }

    #[test]
    fn legacy_blob_with_embedded_url_decodes() {
        // Legacy writers stored the whole record unversioned, URL
        // included. Unknown fields must not break decoding.
        let node = BookmarkNode {
            id: "4".to_string(),
            parent_id: None,
            title: r#"{"title":"Lamp","price":"$49.99","vendor":"ikea.com","url":"https://ikea.com/lamp"}"#
                .to_string(),
            url: Some("https://ikea.com/lamp".to_string()),
            folder: false,
            date_added: Some(5),
        };

        let entry = entry_from_node(&node);
        assert_eq!(entry.title, "Lamp");
        assert_eq!(entry.price.as_deref(), Some("$49.99"));
        assert_eq!(entry.vendor.as_deref(), Some("ikea.com"));
    }

    #[tokio::test]
    async fn folder_is_created_lazily_at_the_bar() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let resolution = store.resolve_folder().await.unwrap();
        assert_eq!(resolution.orphaned, 0);

        let folder = store.substrate.get(&resolution.folder_id).await.unwrap();
        assert!(folder.folder);
        assert_eq!(folder.title, FOLDER_NAME);
        assert_eq!(folder.parent_id.as_deref(), Some(BOOKMARK_BAR_ID));
    }

    #[tokio::test]
    async fn misplaced_folder_is_relocated() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());
        let misplaced = substrate.create("2", FOLDER_NAME, None).await.unwrap();

        let store = WishlistStore::new(substrate.clone());
        let resolution = store.resolve_folder().await.unwrap();
        assert_eq!(resolution.folder_id, misplaced.id);

        let folder = substrate.get(&resolution.folder_id).await.unwrap();
        assert_eq!(folder.parent_id.as_deref(), Some(BOOKMARK_BAR_ID));
    }

    #[tokio::test]
    async fn duplicate_folders_first_wins_and_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());
        let first = substrate
            .create(BOOKMARK_BAR_ID, FOLDER_NAME, None)
            .await
            .unwrap();
        let second = substrate.create("2", FOLDER_NAME, None).await.unwrap();

        let store = WishlistStore::new(substrate.clone());
        let resolution = store.resolve_folder().await.unwrap();
        assert_eq!(resolution.folder_id, first.id);
        assert_eq!(resolution.orphaned, 1);

        // The orphan is left exactly where it was
        let orphan = substrate.get(&second.id).await.unwrap();
        assert_eq!(orphan.parent_id.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let added = store.add(&lamp()).await.unwrap();
        let entries = store.list().await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, added.id);
        assert_eq!(entries[0].record(), lamp());
        assert!(entries[0].date_added > 0);
    }

    #[tokio::test]
    async fn list_is_stable_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.add(&lamp()).await.unwrap();

        let first = store.list().await.unwrap();
        let second = store.list().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn remove_missing_id_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let added = store.add(&lamp()).await.unwrap();

        store.remove("9999").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.remove(&added.id).await.unwrap();
        store.remove(&added.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_blob_round_trips(
            title in ".*",
            price in proptest::option::of(".*"),
            image_url in proptest::option::of(".*"),
            vendor in proptest::option::of(".*"),
        ) {
            let record = ProductRecord {
                title,
                price,
                image_url,
                vendor,
                url: "https://example.com/p/1".to_string(),
            };

            let blob = encode_record(&record).unwrap();
            let node = BookmarkNode {
                id: "1".to_string(),
                parent_id: None,
                title: blob,
                url: Some(record.url.clone()),
                folder: false,
                date_added: Some(0),
            };
            prop_assert_eq!(entry_from_node(&node).record(), record);
        }
    }
}
