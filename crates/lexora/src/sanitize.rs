//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Lesson text, provider credentials and the layout of the upload directory
//! stay out of log output; these helpers reduce them to something safe to share.

use std::path::Path;

/// Maximum number of characters of a provider error body kept in errors.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo and query string from a URL.
///
/// - `https://user:pw@host/run/predict?token=x` → `https://****@host/run/predict`
/// - `https://host/file/video.mp4` → unchanged
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..authority_end].rfind('@') {
            let scheme = &without_query[..scheme_end + 3];
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

/// Describes a piece of text by its length only.
pub fn text_summary(text: &str) -> String {
    format!("<{} chars>", text.chars().count())
}

/// Truncates a provider response body for inclusion in an error message.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push('…');
    truncated
}
