//! The bookmark substrate boundary.
//!
//! The wishlist store is layered on a hierarchical bookmark-like store
//! owned by someone else (a browser, or the local file substrate in this
//! crate). The trait mirrors that collaborator: flat request/response
//! operations plus four change-event streams with no folder scoping.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Reserved root container present in every substrate at startup
/// (the bookmark bar in Chromium's numbering).
pub const BOOKMARK_BAR_ID: &str = "1";

/// A node as reported by the substrate. Folders carry no URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub folder: bool,
    /// Epoch millis, assigned by the substrate at creation.
    pub date_added: Option<i64>,
}

/// Substrate change-event kinds, mirrored from the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookmarkEventKind {
    Created,
    Removed,
    Changed,
    Moved,
}

impl BookmarkEventKind {
    pub const ALL: [BookmarkEventKind; 4] = [
        BookmarkEventKind::Created,
        BookmarkEventKind::Removed,
        BookmarkEventKind::Changed,
        BookmarkEventKind::Moved,
    ];
}

/// A change notification. The payload is intentionally minimal: consumers
/// treat any event as a cache-invalidation signal and re-read.
#[derive(Debug, Clone)]
pub struct BookmarkEvent {
    pub kind: BookmarkEventKind,
    pub id: String,
}

/// Callback invoked synchronously when a subscribed event fires.
pub type EventListener = Arc<dyn Fn(&BookmarkEvent) + Send + Sync>;

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Conditions callers branch on at the substrate boundary.
#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("bookmark node not found: {0}")]
    NotFound(String),
    #[error("bookmark data is corrupt: {0}")]
    Corrupt(String),
}

/// Hierarchical bookmark store the wishlist is layered on.
///
/// All operations are asynchronous request/response calls; the caller is
/// suspended until the substrate responds. No timeouts are imposed here.
#[async_trait]
pub trait BookmarkSubstrate: Send + Sync {
    /// All nodes whose title matches exactly.
    async fn search(&self, title: &str) -> Result<Vec<BookmarkNode>>;

    /// Look up a single node by id.
    async fn get(&self, id: &str) -> Result<BookmarkNode>;

    /// Create a node under `parent_id`. A node without a URL is a folder.
    async fn create(
        &self,
        parent_id: &str,
        title: &str,
        url: Option<&str>,
    ) -> Result<BookmarkNode>;

    /// Reparent a node, returning its updated state.
    async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<BookmarkNode>;

    /// Delete a node. Returns false when no such node existed, so callers
    /// can treat a stale id as a non-fatal condition.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Direct children of a folder, in substrate-native order.
    async fn children(&self, folder_id: &str) -> Result<Vec<BookmarkNode>>;

    /// Register a listener for one event kind. Listeners fire for every
    /// matching event in the store; there is no folder-scoped feed.
    fn add_listener(&self, kind: BookmarkEventKind, listener: EventListener) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}
