//! URL gating for the classifier.
//!
//! Internal browser pages must never be classified; the check runs before
//! any page content is touched.

/// Scheme prefixes the classifier must never run against.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "about:",
    "edge://",
    "brave://",
];

/// Returns true for internal browser URLs and the empty string.
///
/// Pure prefix check, no allocation.
pub fn is_restricted(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// Derive the vendor name from a page URL: the host with a leading
/// `www.` stripped. Returns None when the URL has no host part.
pub fn vendor_from_url(url: &str) -> Option<String> {
    let rest = url
        .trim_start_matches("http://")
        .trim_start_matches("https://");

    let host = match rest.find(['/', '?', '#']) {
        Some(pos) => &rest[..pos],
        None => rest,
    };

    // Drop userinfo and port if present
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = match host.find(':') {
        Some(pos) => &host[..pos],
        None => host,
    };

    if host.is_empty() {
        return None;
    }

    let host = host.strip_prefix("www.").unwrap_or(host);
    Some(host.to_lowercase())
}
