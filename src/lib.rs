//! Bookmark-backed shopping wishlist core.
//!
//! The two load-bearing pieces are the product-page classification
//! heuristic ([`classifier`]) and the wishlist store ([`store`]), which
//! maps a folder of bookmarks into structured, change-notified entries.
//! Persistence goes through the [`substrate::BookmarkSubstrate`] trait;
//! [`local_bookmarks::LocalBookmarkFile`] is the bundled implementation,
//! and [`fallback`] covers environments with no bookmark store at all.

pub mod classifier;
pub mod fallback;
pub mod local_bookmarks;
pub mod records;
pub mod store;
pub mod substrate;
pub mod sync_bridge;
pub mod url_filter;
pub mod wishlist;

pub use classifier::classify;
pub use records::{ClassificationResult, ProductRecord, WishlistEntry};
pub use store::{WishlistStore, FOLDER_NAME};
pub use url_filter::is_restricted;
pub use wishlist::Wishlist;
