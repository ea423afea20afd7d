//! Change propagation from the substrate to the wishlist view.
//!
//! The substrate offers no folder-scoped subscription, so the bridge
//! listens to all four event kinds and treats every event as the same
//! signal: something changed, re-read. Payloads are never inspected.

use std::sync::Arc;
use tracing::debug;

use crate::substrate::{BookmarkEventKind, BookmarkSubstrate, ListenerId};

/// Callback invoked when any bookmark change is observed.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Holds the four event registrations for one consumer. Dropping the
/// bridge deregisters them all, so listeners never outlive the consumer.
pub struct SyncBridge {
    substrate: Arc<dyn BookmarkSubstrate>,
    registrations: Vec<ListenerId>,
}

impl SyncBridge {
    /// Subscribe `on_change` to every substrate event kind.
    pub fn attach(substrate: Arc<dyn BookmarkSubstrate>, on_change: ChangeCallback) -> Self {
        let registrations = BookmarkEventKind::ALL
            .iter()
            .map(|kind| {
                let callback = on_change.clone();
                substrate.add_listener(*kind, Arc::new(move |_event| callback()))
            })
            .collect();

        Self {
            substrate,
            registrations,
        }
    }

    /// Remove all registrations. Safe to call more than once.
    pub fn detach(&mut self) {
        if self.registrations.is_empty() {
            return;
        }
        for id in self.registrations.drain(..) {
            self.substrate.remove_listener(id);
        }
        debug!("Detached bookmark change listeners");
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_bookmarks::LocalBookmarkFile;
    use crate::substrate::BOOKMARK_BAR_ID;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn bridge_fires_on_every_event_kind() {
        let dir = tempfile::tempdir().unwrap();
        let substrate: Arc<dyn BookmarkSubstrate> =
            Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let _bridge = SyncBridge::attach(
            substrate.clone(),
            Arc::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let folder = substrate.create(BOOKMARK_BAR_ID, "Folder", None).await.unwrap();
        let node = substrate
            .create(&folder.id, "Lamp", Some("https://ikea.com/lamp"))
            .await
            .unwrap();
        substrate.move_node(&node.id, BOOKMARK_BAR_ID).await.unwrap();
        substrate.remove(&node.id).await.unwrap();

        // created x2, moved, removed
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn detach_stops_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let substrate: Arc<dyn BookmarkSubstrate> =
            Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let mut bridge = SyncBridge::attach(
            substrate.clone(),
            Arc::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );

        substrate
            .create(BOOKMARK_BAR_ID, "Lamp", Some("https://ikea.com/lamp"))
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        bridge.detach();
        bridge.detach();
        substrate
            .create(BOOKMARK_BAR_ID, "Chair", Some("https://ikea.com/chair"))
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_deregisters() {
        let dir = tempfile::tempdir().unwrap();
        let substrate: Arc<dyn BookmarkSubstrate> =
            Arc::new(LocalBookmarkFile::open(dir.path().join("Bookmarks.json")).unwrap());

        let fired = Arc::new(AtomicUsize::new(0));
        {
            let f = fired.clone();
            let _bridge = SyncBridge::attach(
                substrate.clone(),
                Arc::new(move || {
                    f.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        substrate
            .create(BOOKMARK_BAR_ID, "Lamp", Some("https://ikea.com/lamp"))
            .await
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
