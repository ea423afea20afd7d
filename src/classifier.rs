//! Product page classification and extraction.
//!
//! Operates on a DOM snapshot (page HTML plus its URL) captured by the
//! caller. Five positive signals are scored against one negative URL
//! signal; a page clearing the score threshold yields a normalized
//! [`ProductRecord`].

use anyhow::{Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::records::{ClassificationResult, ProductRecord};
use crate::url_filter::vendor_from_url;

/// URL fragments conventionally used for single-item pages.
const PRODUCT_URL_INDICATORS: &[&str] = &[
    "/product/",
    "/item/",
    "/p/",
    "pid=",
    "product_id=",
    "/buy/",
    "/goods/",
    "sku=",
    "item_id=",
    "/dp/", // Amazon-style product URLs
];

/// URL fragments conventionally used for catalog and listing pages.
const CATALOG_URL_INDICATORS: &[&str] = &[
    "/category/",
    "/collection/",
    "/catalog/",
    "/shop/",
    "/products/",
    "/search",
    "category_id=",
    "/list/",
    "/browse/",
];

/// Minimum number of positive signals for a product classification.
const SIGNAL_THRESHOLD: usize = 3;

/// Classify a page snapshot and extract its product record.
///
/// Never fails: any internal error is logged and reported as a negative
/// classification, so callers can treat the result as authoritative.
pub fn classify(html: &str, url: &str) -> ClassificationResult {
    match classify_document(html, url) {
        Ok(result) => result,
        Err(e) => {
            warn!("⚠️  Classification failed for {}: {}", url, e);
            ClassificationResult::negative()
        }
    }
}

/// Extract a product record without gating on classification.
///
/// Used when the user explicitly asks to bookmark the current page; the
/// field derivation and fallbacks are the same as on the classified path.
pub fn extract(html: &str, url: &str) -> Result<ProductRecord> {
    let document = Html::parse_document(html);
    extract_record(&document, url)
}

fn classify_document(html: &str, url: &str) -> Result<ClassificationResult> {
    let document = Html::parse_document(html);

    let has_price = price_element(&document)?.is_some();
    let has_add_to_cart = detect_add_to_cart(&document)?;
    let has_title = title_element(&document)?.is_some();
    let has_image = product_image(&document)?.is_some();

    let url_lower = url.to_lowercase();
    let has_product_url = PRODUCT_URL_INDICATORS
        .iter()
        .any(|token| url_lower.contains(token));
    let has_catalog_url = CATALOG_URL_INDICATORS
        .iter()
        .any(|token| url_lower.contains(token));

    let signals = [
        has_price,
        has_add_to_cart,
        has_title,
        has_image,
        has_product_url,
    ];
    let score = signals.iter().filter(|s| **s).count();

    debug!(
        "Signals for {}: price={} cart={} title={} image={} url={} catalog={} (score {})",
        url, has_price, has_add_to_cart, has_title, has_image, has_product_url, has_catalog_url,
        score
    );

    if score < SIGNAL_THRESHOLD || has_catalog_url {
        return Ok(ClassificationResult::negative());
    }

    Ok(ClassificationResult::product(extract_record(
        &document, url,
    )?))
}

/// Build the normalized record for a page already judged to be a product
/// page. Every field read tolerates a missing element.
fn extract_record(document: &Html, url: &str) -> Result<ProductRecord> {
    let title = title_element(document)?
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| document_title(document))
        .unwrap_or_default();

    let price = price_element(document)?
        .map(element_text)
        .filter(|p| !p.is_empty());

    let image_url = product_image(document)?.or_else(|| og_image(document));

    Ok(ProductRecord {
        title,
        price,
        image_url,
        vendor: vendor_from_url(url),
        url: url.to_string(),
    })
}

/// First price-indicating element, in priority order: microdata price,
/// class-name substring "price", explicit price data-attribute.
fn price_element(document: &Html) -> Result<Option<ElementRef<'_>>> {
    if let Some(el) = select_first(document, r#"[itemprop="price"]"#)? {
        return Ok(Some(el));
    }
    if let Some(el) = first_with_class_substring(document, "price")? {
        return Ok(Some(el));
    }
    select_first(document, "[data-price]")
}

fn title_element(document: &Html) -> Result<Option<ElementRef<'_>>> {
    if let Some(el) = select_first(document, r#"[itemprop="name"]"#)? {
        return Ok(Some(el));
    }
    select_first(document, "h1")
}

/// URL of a dedicated product image, if any.
fn product_image(document: &Html) -> Result<Option<String>> {
    if let Some(el) = select_first(document, r#"[itemprop="image"]"#)? {
        if let Some(src) = el.value().attr("src").or_else(|| el.value().attr("content")) {
            return Ok(Some(src.to_string()));
        }
    }

    let images = parse_selector("img[class]")?;
    for el in document.select(&images) {
        let matches = el
            .value()
            .classes()
            .any(|class| class.to_lowercase().contains("product"));
        if matches {
            if let Some(src) = el.value().attr("src") {
                return Ok(Some(src.to_string()));
            }
        }
    }

    Ok(None)
}

fn og_image(document: &Html) -> Option<String> {
    let selector = parse_selector(r#"meta[property="og:image"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.to_string())
}

/// Detect an add-to-cart control: a class or id containing "add-to-cart",
/// or a button/link whose visible text reads like one.
fn detect_add_to_cart(document: &Html) -> Result<bool> {
    if first_with_class_substring(document, "add-to-cart")?.is_some() {
        return Ok(true);
    }

    let with_id = parse_selector("[id]")?;
    let id_match = document.select(&with_id).any(|el| {
        el.value()
            .attr("id")
            .map(|id| id.to_lowercase().contains("add-to-cart"))
            .unwrap_or(false)
    });
    if id_match {
        return Ok(true);
    }

    let cart_text = Regex::new(r"(?i)add\s+to\s+(cart|bag|basket)")
        .context("invalid add-to-cart pattern")?;
    let controls = parse_selector("button, a, input[type=\"submit\"]")?;
    let text_match = document.select(&controls).any(|el| {
        cart_text.is_match(&element_text(el))
            || el
                .value()
                .attr("value")
                .map(|v| cart_text.is_match(v))
                .unwrap_or(false)
    });

    Ok(text_match)
}

fn document_title(document: &Html) -> Option<String> {
    let selector = parse_selector("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn first_with_class_substring<'a>(
    document: &'a Html,
    needle: &str,
) -> Result<Option<ElementRef<'a>>> {
    let with_class = parse_selector("[class]")?;
    Ok(document.select(&with_class).find(|el| {
        el.value()
            .classes()
            .any(|class| class.to_lowercase().contains(needle))
    }))
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = parse_selector(selector)?;
    Ok(document.select(&selector).next())
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow::anyhow!("bad selector {selector:?}: {e}"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
