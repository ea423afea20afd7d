use serde::{Deserialize, Serialize};

/// Product information extracted from a page.
///
/// `title` and `url` are always present; everything else is optional and
/// round-trips as absent rather than an empty placeholder string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub url: String,
}

/// Outcome of running the page classifier.
///
/// `record` is populated exactly when `is_product_page` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub is_product_page: bool,
    pub record: Option<ProductRecord>,
}

impl ClassificationResult {
    pub fn negative() -> Self {
        Self {
            is_product_page: false,
            record: None,
        }
    }

    pub fn product(record: ProductRecord) -> Self {
        Self {
            is_product_page: true,
            record: Some(record),
        }
    }
}

/// A persisted wishlist item as materialized from the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    /// Substrate-assigned node id, stable across reads.
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub url: String,
    /// Epoch millis, assigned at creation time.
    pub date_added: i64,
}

impl WishlistEntry {
    /// The product fields of this entry, without the substrate identity.
    pub fn record(&self) -> ProductRecord {
        ProductRecord {
            title: self.title.clone(),
            price: self.price.clone(),
            image_url: self.image_url.clone(),
            vendor: self.vendor.clone(),
            url: self.url.clone(),
        }
    }
}
